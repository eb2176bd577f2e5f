use anyhow::{anyhow, Result};
use comfy_table::{Attribute, Cell, Table};
#[cfg(feature = "time")]
use pngstream::util::event_log::{log_event, Event};
use pngstream::{Filter, FilterType, ImageInfo, PngEncoder};
use std::fs::File;
use std::io::BufWriter;

fn bold_cell(s: &str) -> Cell {
    Cell::new(s).add_attribute(Attribute::Bold)
}

fn parse_dimension(arg: Option<String>, default: u32) -> Result<u32> {
    match arg {
        Some(arg) => arg
            .parse()
            .map_err(|_| anyhow!("Invalid dimension: {arg}")),
        None => Ok(default),
    }
}

fn gradient_row(width: u32, height: u32, y: u32) -> Vec<u8> {
    (0..width)
        .flat_map(|x| {
            let r = (x * 255 / width.max(1)) as u8;
            let g = (y * 255 / height.max(1)) as u8;
            let b = ((x ^ y) & 0xFF) as u8;
            [r, g, b]
        })
        .collect()
}

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let out_path = args
        .next()
        .ok_or_else(|| anyhow!("Usage: pngstream <out.png> [width] [height] [filter]"))?;
    let width = parse_dimension(args.next(), 256)?;
    let height = parse_dimension(args.next(), 256)?;
    let filter_type: FilterType = match args.next() {
        Some(name) => name.parse()?,
        None => FilterType::Default,
    };

    #[cfg(feature = "time")]
    log_event(
        &format!("{out_path}: {width}x{height}, {filter_type:?}"),
        Event::Info,
        None,
    );

    let info = ImageInfo::rgb(width, height, 8)?;
    let sink = BufWriter::new(File::create(&out_path)?);

    let mut encoder = PngEncoder::new(sink, info);
    encoder.set_filter_type(filter_type)?;

    #[cfg(feature = "time")]
    let a = std::time::Instant::now();

    for y in 0..height {
        encoder.write_row(&gradient_row(width, height, y), y)?;
    }
    encoder.end()?;

    #[cfg(feature = "time")]
    log_event(&out_path, Event::TotalElapsed, Some(a.elapsed()));

    let stats = encoder.filter_stats();

    let mut table = Table::new();
    table.set_header(vec![
        bold_cell("Filter"),
        bold_cell("Rows"),
        bold_cell("Entropy (bits)"),
    ]);

    for filter in Filter::ALL {
        table.add_row(vec![
            Cell::new(format!("{filter:?}")),
            Cell::new(stats.rows_with(filter)),
            Cell::new(format!("{:.3}", stats.entropy(filter))),
        ]);
    }

    println!("{table}");
    println!(
        "{out_path}: {width}x{height}, {filter_type:?}, {} rows evaluated, compression ratio {:.4}",
        stats.rows_evaluated(),
        encoder.compression_ratio()?
    );

    Ok(())
}
