/// Generates a method appending a big-endian integer to `self.data`.
#[macro_export]
macro_rules! write_be {
    ($name:ident, $type:ty) => {
        pub fn $name(&mut self, field: $type) -> &mut Self {
            self.data.extend_from_slice(&field.to_be_bytes());

            self
        }
    };
}
