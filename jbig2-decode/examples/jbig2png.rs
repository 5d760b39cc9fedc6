//! This example shows you how to convert a JBIG2 image into a PNG file.
//!
//! Embedded streams from PDF files can be converted together with their
//! global segments by passing the globals as a third argument.

#![allow(missing_docs)]

use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if args.len() != 3 && args.len() != 4 {
        eprintln!("Usage: {} <input.jbig2> <output.png> [globals]", args[0]);

        return ExitCode::FAILURE;
    }

    let input_path = &args[1];
    let output_path = &args[2];

    let data = match std::fs::read(input_path) {
        Ok(data) => data,
        Err(err) => {
            eprintln!("Failed to read input file: {err}");

            return ExitCode::FAILURE;
        }
    };

    let globals = match args.get(3).map(std::fs::read).transpose() {
        Ok(globals) => globals,
        Err(err) => {
            eprintln!("Failed to read globals file: {err}");

            return ExitCode::FAILURE;
        }
    };

    let image = match jbig2_decode::decode_embedded(&data, globals.as_deref()) {
        Ok(image) => image,
        Err(err) => {
            eprintln!("Failed to decode JBIG2: {err}");

            return ExitCode::FAILURE;
        }
    };

    println!("Decoded: {}x{} image", image.width(), image.height());

    if let Err(err) = image.to_gray_image().save(output_path) {
        eprintln!("Failed to save PNG: {err}");

        return ExitCode::FAILURE;
    }

    eprintln!("Saved: {output_path}");

    ExitCode::SUCCESS
}
