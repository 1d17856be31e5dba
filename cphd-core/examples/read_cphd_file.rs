//! Пример: чтение CPHD файла через CphdReader
//!
//! Демонстрирует:
//! - открытие файла и разбор заголовка / метаданных
//! - параллельное чтение окна канала
//! - обход ячеек через типизированное представление
//!
//! Без аргумента генерирует синтетический файл во временном каталоге.

use std::{env, path::PathBuf};

use cphd_core::CphdReader;
use cphd_testkit::CphdBuilder;
use cphd_types::SampleType;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let synthetic;
    let path: PathBuf = match env::args().nth(1) {
        Some(p) => p.into(),
        None => {
            synthetic = CphdBuilder::new(SampleType::ComplexInt16)
                .channel(256, 512)
                .channel(128, 1024)
                .write_temp()?;
            synthetic.path().to_path_buf()
        }
    };

    let reader = match CphdReader::open(&path, None) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("✗ Open failed: {e}");
            return Err(Box::new(e));
        }
    };

    let h = reader.header();
    println!("✓ {path:?} opened");
    println!("  Version        : CPHD/{}", h.version);
    println!("  Classification : {}", h.classification);
    println!("  Sample type    : {}", reader.sample_type());
    println!("  Channels       : {}", reader.num_channels());
    println!("  Workers        : {}", reader.workers());

    for channel in 0..reader.num_channels() {
        let shape = reader.channel_shape(channel)?;

        // Центральная четверть канала
        let (v0, s0) = (shape.num_vectors / 4, shape.num_samples / 4);
        let (v1, s1) = (v0 + shape.num_vectors / 2, s0 + shape.num_samples / 2);

        let block = reader.read_wideband(channel, v0, Some(v1), s0, Some(s1), None)?;
        let cells = block.as_typed_cells(reader.sample_type())?;

        let mut energy = 0.0;
        for i in 0..cells.len() {
            energy += cells.get_c64(i)?.norm_sqr();
        }

        println!(
            "\n  [{channel}] {}x{} -> window {}x{}, mean power {:.2}",
            shape.num_vectors,
            shape.num_samples,
            block.shape().num_vectors,
            block.shape().num_samples,
            energy / cells.len() as f64
        );
    }

    let stats = reader.stats();
    println!("\n✓ Read complete");
    println!("  Requests       : {}", stats.requests);
    println!("  Positioned I/O : {}", stats.positioned_reads);
    println!("  Bytes read     : {}", stats.bytes_read);

    Ok(())
}
