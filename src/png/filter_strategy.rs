use crate::error::{EncodeError, Result};
use crate::fail;
use crate::png::filter::{filter_row, filtered_cost};
use crate::png::grammar::{Filter, ImageInfo};

/// Rows between two evaluations of [`FilterType::Aggressive`].
pub const AGGRESSIVE_TEST_INTERVAL: u32 = 8;

/// How the writer picks the filter of each row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum FilterType {
    None,
    Sub,
    Up,
    Average,
    Paeth,
    /// A single filter guessed from the image description.
    #[default]
    Default,
    /// Tries every filter on one row out of [`AGGRESSIVE_TEST_INTERVAL`].
    Aggressive,
    /// Tries every filter on every row.
    VeryAggressive,
    /// Cycles through the five filters, one row each.
    Alternate,
}

impl FilterType {
    pub const fn code(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Sub => 1,
            Self::Up => 2,
            Self::Average => 3,
            Self::Paeth => 4,
            Self::Default => -1,
            Self::Aggressive => -2,
            Self::Alternate => -3,
            Self::VeryAggressive => -4,
        }
    }

    pub const fn fixed(self) -> Option<Filter> {
        match self {
            Self::None => Some(Filter::None),
            Self::Sub => Some(Filter::Sub),
            Self::Up => Some(Filter::Up),
            Self::Average => Some(Filter::Average),
            Self::Paeth => Some(Filter::Paeth),
            _ => None,
        }
    }

    const fn test_interval(self) -> Option<u32> {
        match self {
            Self::Aggressive => Some(AGGRESSIVE_TEST_INTERVAL),
            Self::VeryAggressive => Some(1),
            _ => None,
        }
    }
}

impl From<Filter> for FilterType {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::None => Self::None,
            Filter::Sub => Self::Sub,
            Filter::Up => Self::Up,
            Filter::Average => Self::Average,
            Filter::Paeth => Self::Paeth,
        }
    }
}

impl TryFrom<i32> for FilterType {
    type Error = EncodeError;

    fn try_from(code: i32) -> Result<Self> {
        let filter_type = match code {
            0 => Self::None,
            1 => Self::Sub,
            2 => Self::Up,
            3 => Self::Average,
            4 => Self::Paeth,
            -1 => Self::Default,
            -2 => Self::Aggressive,
            -3 => Self::Alternate,
            -4 => Self::VeryAggressive,
            foreign => fail!(Config, "Unsupported filter type: {}", foreign),
        };

        Ok(filter_type)
    }
}

impl std::str::FromStr for FilterType {
    type Err = EncodeError;

    fn from_str(name: &str) -> Result<Self> {
        let filter_type = match name.to_ascii_lowercase().as_str() {
            "none" => Self::None,
            "sub" => Self::Sub,
            "up" => Self::Up,
            "average" => Self::Average,
            "paeth" => Self::Paeth,
            "default" => Self::Default,
            "aggressive" => Self::Aggressive,
            "very_aggressive" | "very-aggressive" => Self::VeryAggressive,
            "alternate" => Self::Alternate,
            _ => fail!(Config, "Unknown filter type: {}", name),
        };

        Ok(filter_type)
    }
}

/// Byte statistics over every filtered row computed so far. Purely
/// informative: nothing here feeds back into the filter choice.
#[derive(Debug, Clone)]
pub struct FilterStats {
    histograms: Box<[[u64; 256]; 5]>,
    rows_per_filter: [u32; 5],
    rows_evaluated: u32,
}

impl Default for FilterStats {
    fn default() -> Self {
        Self {
            histograms: Box::new([[0; 256]; 5]),
            rows_per_filter: [0; 5],
            rows_evaluated: 0,
        }
    }
}

impl FilterStats {
    fn record_candidate(&mut self, filter: Filter, filtered: &[u8]) {
        let histogram = &mut self.histograms[filter.index()];
        for &b in &filtered[1..] {
            histogram[b as usize] += 1;
        }
    }

    /// Rows emitted with `filter`.
    pub const fn rows_with(&self, filter: Filter) -> u32 {
        self.rows_per_filter[filter.index()]
    }

    /// Rows on which every filter was tried.
    pub const fn rows_evaluated(&self) -> u32 {
        self.rows_evaluated
    }

    pub fn histogram(&self, filter: Filter) -> &[u64; 256] {
        &self.histograms[filter.index()]
    }

    /// Shannon entropy, in bits per byte, of every byte `filter` produced.
    pub fn entropy(&self, filter: Filter) -> f64 {
        let histogram = self.histogram(filter);
        let total: u64 = histogram.iter().sum();
        if total == 0 {
            return 0.0;
        }

        histogram
            .iter()
            .filter(|&&count| count > 0)
            .map(|&count| {
                let p = count as f64 / total as f64;
                -p * p.log2()
            })
            .sum()
    }
}

/// Chooses and computes the filtered bytes of each row.
///
/// Holds one scratch buffer per filter, so the bytes of the winning filter
/// are never computed twice after a tentative pass.
#[derive(Debug)]
pub struct FilterWriteStrategy {
    configured: FilterType,
    current: Filter,
    test_interval: Option<u32>,
    last_tested: Option<u32>,
    candidates: [Vec<u8>; 5],
    costs: [u32; 5],
    stats: FilterStats,
}

impl FilterWriteStrategy {
    pub fn new(info: &ImageInfo, configured: FilterType) -> Self {
        let current = configured.fixed().unwrap_or_else(|| Self::first_guess(info));
        let row_len = info.bytes_per_row() + 1;

        Self {
            configured,
            current,
            test_interval: configured.test_interval(),
            last_tested: None,
            candidates: std::array::from_fn(|_| vec![0; row_len]),
            costs: [0; 5],
            stats: FilterStats::default(),
        }
    }

    fn first_guess(info: &ImageInfo) -> Filter {
        if (info.rows() < 8 && info.cols() < 8) || info.is_indexed() || info.bit_depth() < 8 {
            Filter::None
        } else {
            Filter::Paeth
        }
    }

    pub const fn configured(&self) -> FilterType {
        self.configured
    }

    pub const fn stats(&self) -> &FilterStats {
        &self.stats
    }

    /// Costs of the five candidates of the last evaluated row.
    pub const fn last_costs(&self) -> &[u32; 5] {
        &self.costs
    }

    pub fn should_test_all(&self, row: u32) -> bool {
        match (self.test_interval, self.last_tested) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(interval), Some(last)) => row >= last.saturating_add(interval),
        }
    }

    /// Filters the raw row `raw` (previous row `prev`) and returns the chosen
    /// filter together with the filtered bytes, filter type byte included.
    pub fn filter_row(
        &mut self,
        row: u32,
        raw: &[u8],
        prev: &[u8],
        bytes_pixel: usize,
    ) -> (Filter, &[u8]) {
        let filter = if self.should_test_all(row) {
            for filter in Filter::ALL {
                let out = &mut self.candidates[filter.index()];
                filter_row(filter, raw, prev, bytes_pixel, out);
                self.costs[filter.index()] = filtered_cost(out);
                self.stats.record_candidate(filter, out);
            }

            self.last_tested = Some(row);
            self.stats.rows_evaluated += 1;

            let mut best = Filter::None;
            for filter in Filter::ALL {
                if self.costs[filter.index()] < self.costs[best.index()] {
                    best = filter;
                }
            }

            self.current = best;
            best
        } else {
            let filter = match self.configured {
                FilterType::Alternate => Filter::ALL[row as usize % Filter::ALL.len()],
                _ => self.current,
            };

            let out = &mut self.candidates[filter.index()];
            filter_row(filter, raw, prev, bytes_pixel, out);
            self.stats.record_candidate(filter, out);
            filter
        };

        self.stats.rows_per_filter[filter.index()] += 1;

        (filter, &self.candidates[filter.index()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use pretty_assertions::assert_eq;

    fn gradient_rows(info: &ImageInfo) -> Vec<Vec<u8>> {
        (0..info.rows())
            .map(|y| {
                let mut row = vec![0u8; info.bytes_per_row() + 1];
                for (x, b) in row.iter_mut().enumerate().skip(1) {
                    *b = (x as u32 * 3 + y * 7 + (x as u32 * y) % 13) as u8;
                }
                row
            })
            .collect()
    }

    #[test]
    fn test_codes_round_trip() -> Result<()> {
        for filter_type in [
            FilterType::None,
            FilterType::Sub,
            FilterType::Up,
            FilterType::Average,
            FilterType::Paeth,
            FilterType::Default,
            FilterType::Aggressive,
            FilterType::VeryAggressive,
            FilterType::Alternate,
        ] {
            assert_eq!(FilterType::try_from(filter_type.code())?, filter_type);
        }

        let err = FilterType::try_from(7).unwrap_err();
        assert!(matches!(err, EncodeError::Config(_)));

        assert_eq!("Paeth".parse::<FilterType>()?, FilterType::Paeth);
        assert_eq!("very-aggressive".parse::<FilterType>()?, FilterType::VeryAggressive);
        assert!(matches!("median".parse::<FilterType>(), Err(EncodeError::Config(_))));

        Ok(())
    }

    #[test]
    fn test_first_guess() -> Result<()> {
        let small = ImageInfo::rgb(4, 4, 8)?;
        let large = ImageInfo::rgb(64, 64, 8)?;
        let packed = ImageInfo::greyscale(64, 64, 4)?;
        let indexed = ImageInfo::indexed(64, 64, 8)?;

        assert_eq!(FilterWriteStrategy::new(&small, FilterType::Default).current, Filter::None);
        assert_eq!(FilterWriteStrategy::new(&large, FilterType::Default).current, Filter::Paeth);
        assert_eq!(FilterWriteStrategy::new(&packed, FilterType::Default).current, Filter::None);
        assert_eq!(FilterWriteStrategy::new(&indexed, FilterType::Default).current, Filter::None);
        assert_eq!(FilterWriteStrategy::new(&large, FilterType::Up).current, Filter::Up);

        Ok(())
    }

    #[test]
    fn test_adaptive_picks_minimum_cost() -> Result<()> {
        let info = ImageInfo::rgb(16, 12, 8)?;
        let rows = gradient_rows(&info);
        let mut strategy = FilterWriteStrategy::new(&info, FilterType::VeryAggressive);

        let mut prev = vec![0u8; info.bytes_per_row() + 1];
        for (y, raw) in rows.iter().enumerate() {
            let (filter, bytes) = strategy.filter_row(y as u32, raw, &prev, info.bytes_pixel());
            let bytes = bytes.to_vec();

            let costs = *strategy.last_costs();
            let min = *costs.iter().min().unwrap();
            assert_eq!(costs[filter.index()], min);

            // earliest filter among the cheapest ones
            let first_min = Filter::ALL.into_iter().find(|f| costs[f.index()] == min).unwrap();
            assert_eq!(filter, first_min);

            let mut expected = vec![0u8; bytes.len()];
            filter_row(filter, raw, &prev, info.bytes_pixel(), &mut expected);
            assert_eq!(bytes, expected);

            prev = raw.clone();
        }

        assert_eq!(strategy.stats().rows_evaluated(), info.rows());

        Ok(())
    }

    #[test]
    fn test_aggressive_tests_every_eighth_row() -> Result<()> {
        let info = ImageInfo::greyscale(32, 20, 8)?;
        let rows = gradient_rows(&info);
        let mut strategy = FilterWriteStrategy::new(&info, FilterType::Aggressive);

        let mut prev = vec![0u8; info.bytes_per_row() + 1];
        let mut tested = vec![];
        for (y, raw) in rows.iter().enumerate() {
            if strategy.should_test_all(y as u32) {
                tested.push(y);
            }
            strategy.filter_row(y as u32, raw, &prev, 1);
            prev = raw.clone();
        }

        assert_eq!(tested, vec![0, 8, 16]);
        assert_eq!(strategy.stats().rows_evaluated(), 3);

        Ok(())
    }

    #[test]
    fn test_all_zero_row_prefers_none() -> Result<()> {
        let info = ImageInfo::greyscale(8, 8, 8)?;
        let mut strategy = FilterWriteStrategy::new(&info, FilterType::VeryAggressive);
        let zero = vec![0u8; info.bytes_per_row() + 1];

        let (filter, bytes) = strategy.filter_row(0, &zero, &zero, 1);
        assert_eq!(filter, Filter::None);
        assert_eq!(bytes[0], 0);

        Ok(())
    }

    #[test]
    fn test_alternate_and_stats() -> Result<()> {
        let info = ImageInfo::greyscale(8, 10, 8)?;
        let rows = gradient_rows(&info);
        let mut strategy = FilterWriteStrategy::new(&info, FilterType::Alternate);

        let mut prev = vec![0u8; info.bytes_per_row() + 1];
        for (y, raw) in rows.iter().enumerate() {
            let (filter, bytes) = strategy.filter_row(y as u32, raw, &prev, 1);
            assert_eq!(filter, Filter::ALL[y % 5]);
            assert_eq!(bytes[0], filter as u8);
            prev = raw.clone();
        }

        for filter in Filter::ALL {
            assert_eq!(strategy.stats().rows_with(filter), 2);
            let total: u64 = strategy.stats().histogram(filter).iter().sum();
            assert_eq!(total, 2 * 8);
            let entropy = strategy.stats().entropy(filter);
            assert!((0.0..=8.0).contains(&entropy));
        }
        assert_eq!(strategy.stats().rows_evaluated(), 0);

        Ok(())
    }
}
