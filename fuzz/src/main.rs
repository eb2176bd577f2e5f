use afl::fuzz;
use pngstream::{Chunk, FilterType, ImageInfo, PngEncoder};

fn main() {
    fuzz!(|data: &[u8]| {
        let [cols, rows, depth, color, filter, rest @ ..] = data else {
            return;
        };

        let cols = *cols as u32 % 32 + 1;
        let rows = *rows as u32 % 32 + 1;
        let depth = [1, 2, 4, 8, 16][*depth as usize % 5];

        let info = match color % 5 {
            0 => ImageInfo::greyscale(cols, rows, depth),
            1 => ImageInfo::greyscale_alpha(cols, rows, depth),
            2 => ImageInfo::rgb(cols, rows, depth),
            3 => ImageInfo::rgba(cols, rows, depth),
            _ => ImageInfo::indexed(cols, rows, depth),
        };
        let Ok(info) = info else {
            return;
        };

        let mut encoder = PngEncoder::new(Vec::new(), info);
        let Ok(filter_type) = FilterType::try_from(*filter as i32 % 9 - 4) else {
            return;
        };
        let _ = encoder.set_filter_type(filter_type);

        if info.is_indexed() {
            let _ = encoder.queue_chunk(Chunk::palette(&[[0, 0, 0], [255, 255, 255]]));
        }

        let len = info.bytes_per_row();
        for (y, row) in rest.chunks_exact(len).take(rows as usize).enumerate() {
            if encoder.write_row(pngstream::Scanline::Packed(row), y as u32).is_err() {
                return;
            }
        }

        let _ = encoder.end();
    });
}
