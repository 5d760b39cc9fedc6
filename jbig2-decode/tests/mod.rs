//! Synthetic test suite for jbig2-decode.
//!
//! Every case encodes its streams with the small encoder in `encoder.rs`
//! and checks the decoded pages pixel by pixel.


use std::any::Any;
use std::panic::{AssertUnwindSafe, PanicHookInfo, catch_unwind};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use jbig2_decode::{
    Bitmap, DecodeError, DecodeSettings, Document, ErrorKind, FormatError, Image, SegmentError,
};
use rayon::prelude::*;

use encoder::{
    ArithmeticEncoder, BitWriter, EXTENDED_TEMPLATE, IntegerEncoder, SymbolIdEncoder, contexts,
    encode_generic, encode_mmr, encode_refinement, generic_context_count, generic_flags,
    nominal_at, write_b1,
};
use stream::*;

type TestResult = Result<(), String>;

const CASES: &[(&str, fn() -> TestResult)] = &[
    ("generic/templates", generic_templates),
    ("generic/typical_prediction", generic_typical_prediction),
    ("generic/at_pixels", generic_at_pixels),
    ("generic/extended_template", generic_extended_template),
    ("generic/mmr", generic_mmr),
    ("generic/checkerboard", checkerboard),
    ("generic/unknown_length", unknown_length_region),
    ("refinement/page", refine_page),
    ("refinement/intermediate_region", refine_intermediate_region),
    ("text/reference_corners", text_reference_corners),
    ("text/globals", text_with_globals),
    ("symbol/refine_aggregate", symbol_refine_aggregate),
    ("halftone/patterns", halftone_patterns),
    ("page/striped", striped_page),
    ("page/default_pixel", default_pixel_page),
    ("document/pages", multiple_pages),
    ("errors/unknown_segment_type", unknown_segment_type),
    ("errors/forward_reference", forward_reference),
    ("errors/missing_page_information", missing_page_information),
    ("errors/pixel_limit", pixel_limit),
    ("concurrency/shared_input", concurrent_decoding),
];

struct TestReport {
    name: &'static str,
    duration: Duration,
    outcome: TestResult,
}

fn main() {
    let _panic_hook_guard = PanicHookGuard::install();
    if !run_harness() {
        std::process::exit(1);
    }
}

fn run_harness() -> bool {
    let progress_bar = ProgressBar::new(CASES.len() as u64);
    progress_bar.set_style(
        ProgressStyle::with_template(
            "{spinner} {pos}/{len} [{elapsed_precise}] [{wide_bar}] {msg}",
        )
        .unwrap()
        .progress_chars("=>-"),
    );

    let reports: Vec<TestReport> = CASES
        .par_iter()
        .map(|&(name, case)| {
            progress_bar.set_message(name);
            let start = Instant::now();
            let outcome = catch_unwind(AssertUnwindSafe(case)).unwrap_or_else(|payload| {
                let panic_msg = describe_panic(payload.as_ref());
                Err(format!("panic: {panic_msg}"))
            });
            progress_bar.inc(1);
            TestReport {
                name,
                duration: start.elapsed(),
                outcome,
            }
        })
        .collect();

    progress_bar.finish_with_message("synthetic tests complete");

    println!("\nDetailed results:");
    for report in &reports {
        match &report.outcome {
            Ok(_) => println!("[PASS] {:<60} ({:.2?})", report.name, report.duration),
            Err(err) => {
                println!("[FAIL] {:<60} ({:.2?})", report.name, report.duration);
                println!("       {err}");
            }
        }
    }

    let failures: Vec<_> = reports
        .iter()
        .filter_map(|report| report.outcome.as_ref().err().map(|err| (report.name, err)))
        .collect();

    if failures.is_empty() {
        true
    } else {
        println!("\n{} of {} tests failed:", failures.len(), reports.len());

        for (name, err) in failures {
            println!(" - {name}: {err}");
        }

        false
    }
}

fn describe_panic(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_owned()
    } else {
        "unknown panic payload".to_owned()
    }
}

#[allow(clippy::type_complexity)]
struct PanicHookGuard(Option<Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>>);

impl PanicHookGuard {
    fn install() -> Self {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(|_| {
            // Swallow default panic output; harness reports failures explicitly.
        }));
        Self(Some(previous))
    }
}

impl Drop for PanicHookGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.0.take() {
            std::panic::set_hook(previous);
        }
    }
}

// Helpers.

fn decode(data: &[u8]) -> Result<Image, String> {
    jbig2_decode::decode(data).map_err(|err| format!("decode failed: {err}"))
}

fn compare(image: &Image, expected: &Bitmap) -> TestResult {
    if (image.width(), image.height()) != (expected.width(), expected.height()) {
        return Err(format!(
            "expected a {}x{} page, got {}x{}",
            expected.width(),
            expected.height(),
            image.width(),
            image.height()
        ));
    }

    let diff = (0..expected.height())
        .flat_map(|y| (0..expected.width()).map(move |x| (x, y)))
        .filter(|&(x, y)| image.pixel(x, y) != expected.get_pixel(x, y))
        .count();

    if diff > 0 {
        return Err(format!("pixel diff {diff} detected"));
    }

    Ok(())
}

fn expect_error(result: jbig2_decode::Result<Image>, expected: DecodeError) -> TestResult {
    match result {
        Ok(_) => Err(format!("expected {expected:?}, but decoding succeeded")),
        Err(err) if err == expected => Ok(()),
        Err(err) => Err(format!("expected {expected:?}, got {err:?}")),
    }
}

fn bitmap(rows: &[&str]) -> Bitmap {
    let mut bitmap = Bitmap::new(rows[0].len() as u32, rows.len() as u32);

    for (y, row) in rows.iter().enumerate() {
        for (x, c) in row.chars().enumerate() {
            bitmap.set_pixel(x as u32, y as u32, c == '#');
        }
    }

    bitmap
}

/// Deterministic noise with a blank first row and some repeated rows, so
/// that typical prediction has something to predict.
fn noise(width: u32, height: u32, seed: u32) -> Bitmap {
    let mut bitmap = Bitmap::new(width, height);
    let mut state = seed.max(1);

    for y in 1..height {
        for x in 0..width {
            let black = if y % 5 == 2 {
                bitmap.get_pixel(x, y - 1)
            } else {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state % 3 == 0
            };

            bitmap.set_pixel(x, y, black);
        }
    }

    bitmap
}

/// OR `symbol` onto `target` with its top-left corner at `(x, y)`.
fn draw(target: &mut Bitmap, symbol: &Bitmap, x: i32, y: i32) {
    for sy in 0..symbol.height() {
        for sx in 0..symbol.width() {
            let (tx, ty) = (x + sx as i32, y + sy as i32);

            if symbol.get_pixel(sx, sy)
                && (0..target.width() as i32).contains(&tx)
                && (0..target.height() as i32).contains(&ty)
            {
                target.set_pixel(tx as u32, ty as u32, true);
            }
        }
    }
}

struct GenericCoding<'a> {
    template: u8,
    tpgdon: bool,
    at: &'a [(i32, i32)],
}

impl GenericCoding<'_> {
    fn nominal(template: u8) -> Self {
        Self {
            template,
            tpgdon: false,
            at: nominal_at(template),
        }
    }
}

/// The data of a generic region segment (7.4.6) placed at `(x, y)`.
fn generic_region(bitmap: &Bitmap, (x, y): (u32, u32), op: u8, coding: &GenericCoding<'_>) -> Vec<u8> {
    let mut data = region_info(bitmap.width(), bitmap.height(), x, y, op);
    data.push(generic_flags(coding.template, coding.tpgdon));
    data.extend(at_bytes(coding.at));

    let mut encoder = ArithmeticEncoder::new();
    let mut cx = contexts(generic_context_count(coding.template));
    encode_generic(
        &mut encoder,
        &mut cx,
        bitmap,
        coding.template,
        coding.tpgdon,
        coding.at,
    );
    data.extend(encoder.finish());

    data
}

/// A file with a single page made of one generic region.
fn single_region_file(bitmap: &Bitmap, coding: &GenericCoding<'_>) -> Vec<u8> {
    file(
        1,
        &[
            segment(0, PAGE_INFORMATION).data(&PageInfo::new(bitmap.width(), bitmap.height()).data()),
            segment(1, IMMEDIATE_GENERIC_REGION).data(&generic_region(bitmap, (0, 0), OR, coding)),
            segment(2, END_OF_PAGE).data(&[]),
            segment(3, END_OF_FILE).page(0).data(&[]),
        ],
    )
}

/// The data of a generic refinement region segment (7.4.7) refining
/// `reference` into `target`.
fn refinement_region(
    target: &Bitmap,
    reference: &Bitmap,
    op: u8,
    template: u8,
    tpgron: bool,
) -> Vec<u8> {
    let mut data = region_info(target.width(), target.height(), 0, 0, op);
    data.push(template | (tpgron as u8) << 1);
    if template == 0 {
        data.extend(at_bytes(&[(-1, -1), (-1, -1)]));
    }

    let mut encoder = ArithmeticEncoder::new();
    let mut cx = contexts(if template == 0 { 1 << 13 } else { 1 << 10 });
    encode_refinement(&mut encoder, &mut cx, target, reference, template, tpgron);
    data.extend(encoder.finish());

    data
}

/// The data of an arithmetic coded symbol dictionary (7.4.2) that exports
/// all of its symbols, which must be ordered by height.
fn symbol_dictionary(symbols: &[Bitmap]) -> Vec<u8> {
    let at = nominal_at(0);
    let count = symbols.len() as u32;

    let mut data = 0_u16.to_be_bytes().to_vec();
    data.extend(at_bytes(at));
    data.extend(count.to_be_bytes());
    data.extend(count.to_be_bytes());

    let mut encoder = ArithmeticEncoder::new();
    let mut cx = contexts(generic_context_count(0));
    let (mut iadh, mut iadw, mut iaex) = (
        IntegerEncoder::new(),
        IntegerEncoder::new(),
        IntegerEncoder::new(),
    );

    let mut height = 0;
    let mut i = 0;

    while i < symbols.len() {
        let class_height = symbols[i].height();
        iadh.encode(&mut encoder, (class_height - height) as i32);
        height = class_height;

        let mut width = 0_i32;
        while i < symbols.len() && symbols[i].height() == class_height {
            let symbol = &symbols[i];
            iadw.encode(&mut encoder, symbol.width() as i32 - width);
            width = symbol.width() as i32;
            encode_generic(&mut encoder, &mut cx, symbol, 0, false, at);
            i += 1;
        }

        iadw.encode_oob(&mut encoder);
    }

    // Skip none, then export all.
    iaex.encode(&mut encoder, 0);
    iaex.encode(&mut encoder, count as i32);

    data.extend(encoder.finish());
    data
}

struct TextLayout {
    corner: u8,
    transposed: bool,
    /// The T coordinate of the only strip.
    strip_t: i32,
    first_s: i32,
    /// Symbol IDs, each followed by the S gap to the next instance.
    instances: Vec<(u32, i32)>,
}

/// The data of an arithmetic coded text region segment (7.4.3) with a
/// single strip.
fn text_region(width: u32, height: u32, layout: &TextLayout, symbol_code_len: u8) -> Vec<u8> {
    let mut data = region_info(width, height, 0, 0, OR);
    let flags = (layout.corner as u16) << 4 | (layout.transposed as u16) << 6;
    data.extend(flags.to_be_bytes());
    data.extend((layout.instances.len() as u32).to_be_bytes());

    let mut encoder = ArithmeticEncoder::new();
    let (mut iadt, mut iafs, mut iads) = (
        IntegerEncoder::new(),
        IntegerEncoder::new(),
        IntegerEncoder::new(),
    );
    let mut iaid = SymbolIdEncoder::new(symbol_code_len);

    iadt.encode(&mut encoder, 0);
    iadt.encode(&mut encoder, layout.strip_t);
    iafs.encode(&mut encoder, layout.first_s);

    for (i, &(id, gap)) in layout.instances.iter().enumerate() {
        iaid.encode(&mut encoder, id);

        if i + 1 == layout.instances.len() {
            iads.encode_oob(&mut encoder);
        } else {
            iads.encode(&mut encoder, gap);
        }
    }

    data.extend(encoder.finish());
    data
}

fn text_symbols() -> Vec<Bitmap> {
    vec![
        bitmap(&["###", "#.."]),
        bitmap(&["##", "##"]),
        bitmap(&[".#.", "###", ".#."]),
    ]
}

// Generic regions.

fn generic_templates() -> TestResult {
    let bitmap = noise(37, 23, 7);

    for template in 0..4 {
        let image = decode(&single_region_file(&bitmap, &GenericCoding::nominal(template)))?;
        compare(&image, &bitmap).map_err(|err| format!("template {template}: {err}"))?;
    }

    Ok(())
}

fn generic_typical_prediction() -> TestResult {
    let bitmap = noise(41, 30, 99);

    for template in 0..4 {
        let coding = GenericCoding {
            tpgdon: true,
            ..GenericCoding::nominal(template)
        };
        let image = decode(&single_region_file(&bitmap, &coding))?;
        compare(&image, &bitmap).map_err(|err| format!("template {template}: {err}"))?;
    }

    Ok(())
}

fn generic_at_pixels() -> TestResult {
    let bitmap = noise(29, 17, 1234);
    let cases: [(u8, &[(i32, i32)]); 4] = [
        (0, &[(-5, -1), (4, -2), (-1, -3), (-6, 0)]),
        (1, &[(-4, -1)]),
        (2, &[(0, -3)]),
        (3, &[(-7, 0)]),
    ];

    for (template, at) in cases {
        let coding = GenericCoding {
            template,
            tpgdon: template % 2 == 0,
            at,
        };
        let image = decode(&single_region_file(&bitmap, &coding))?;
        compare(&image, &bitmap).map_err(|err| format!("template {template}: {err}"))?;
    }

    Ok(())
}

fn generic_extended_template() -> TestResult {
    let bitmap = noise(45, 26, 77);
    let at = [
        (2, -1),
        (-5, -1),
        (3, -2),
        (-4, -2),
        (-1, -3),
        (0, -4),
        (4, -3),
        (-6, -2),
        (-7, -1),
        (5, -1),
        (-8, 0),
        (-5, 0),
    ];

    let placements: [&[(i32, i32)]; 2] = [nominal_at(EXTENDED_TEMPLATE), &at];

    for tpgdon in [false, true] {
        for at in placements {
            let coding = GenericCoding {
                template: EXTENDED_TEMPLATE,
                tpgdon,
                at,
            };
            let image = decode(&single_region_file(&bitmap, &coding))?;
            compare(&image, &bitmap).map_err(|err| format!("TPGDON {tpgdon}, AT {at:?}: {err}"))?;
        }
    }

    Ok(())
}

fn generic_mmr() -> TestResult {
    // Runs of one to four pixels, so every row starts with a short white run.
    let mut bitmap = Bitmap::new(30, 9);
    for y in 0..9 {
        for x in 0..30 {
            bitmap.set_pixel(x, y, (x / (1 + y % 4) + y) % 2 == 1);
        }
    }

    let mut region = region_info(30, 9, 0, 0, OR);
    region.push(0x01);
    region.extend(encode_mmr(&bitmap));

    let data = file(
        1,
        &[
            segment(0, PAGE_INFORMATION).data(&PageInfo::new(30, 9).data()),
            segment(1, IMMEDIATE_GENERIC_REGION).data(&region),
            segment(2, END_OF_PAGE).data(&[]),
        ],
    );

    compare(&decode(&data)?, &bitmap)
}

fn checkerboard() -> TestResult {
    let mut board = Bitmap::new(8, 8);
    for y in 0..8 {
        for x in 0..8 {
            board.set_pixel(x, y, (x + y) % 2 == 1);
        }
    }

    let image = decode(&single_region_file(&board, &GenericCoding::nominal(0)))?;
    compare(&image, &board)?;

    let gray = image.to_gray_image();
    if gray.get_pixel(0, 0).0 != [255] || gray.get_pixel(1, 0).0 != [0] {
        return Err("black pixels must map to 0 and white ones to 255".to_string());
    }

    Ok(())
}

fn unknown_length_region() -> TestResult {
    let bitmap = noise(20, 12, 5);
    let mut region = generic_region(&bitmap, (0, 0), OR, &GenericCoding::nominal(0));
    region.extend(bitmap.height().to_be_bytes());

    let data = file(
        1,
        &[
            segment(0, PAGE_INFORMATION).data(&PageInfo::new(20, 12).data()),
            segment(1, IMMEDIATE_GENERIC_REGION)
                .unknown_length()
                .data(&region),
            segment(2, END_OF_PAGE).data(&[]),
        ],
    );

    compare(&decode(&data)?, &bitmap)
}

// Refinement regions.

fn refine_page() -> TestResult {
    let reference = noise(24, 16, 17);
    let mut target = reference.clone();
    for i in 0..16 {
        target.set_pixel(i + 3, i, !target.get_pixel(i + 3, i));
    }

    let info = PageInfo {
        overridden: true,
        ..PageInfo::new(24, 16)
    };

    for template in 0..2 {
        for tpgron in [false, true] {
            let data = file(
                1,
                &[
                    segment(0, PAGE_INFORMATION).data(&info.data()),
                    segment(1, IMMEDIATE_GENERIC_REGION).data(&generic_region(
                        &reference,
                        (0, 0),
                        REPLACE,
                        &GenericCoding::nominal(0),
                    )),
                    segment(2, IMMEDIATE_REFINEMENT_REGION).data(&refinement_region(
                        &target, &reference, REPLACE, template, tpgron,
                    )),
                    segment(3, END_OF_PAGE).data(&[]),
                ],
            );

            compare(&decode(&data)?, &target)
                .map_err(|err| format!("template {template}, TPGRON {tpgron}: {err}"))?;
        }
    }

    Ok(())
}

fn refine_intermediate_region() -> TestResult {
    let reference = noise(16, 16, 3);
    let target = noise(16, 16, 4);

    let data = file(
        1,
        &[
            segment(0, PAGE_INFORMATION).data(&PageInfo::new(16, 16).data()),
            segment(1, INTERMEDIATE_GENERIC_REGION).data(&generic_region(
                &reference,
                (0, 0),
                OR,
                &GenericCoding::nominal(2),
            )),
            segment(2, IMMEDIATE_REFINEMENT_REGION)
                .refers_to(&[1])
                .data(&refinement_region(&target, &reference, OR, 1, false)),
            segment(3, END_OF_PAGE).data(&[]),
        ],
    );

    compare(&decode(&data)?, &target)
}

// Text regions.

fn text_reference_corners() -> TestResult {
    let symbols = text_symbols();
    let dictionary = symbol_dictionary(&symbols);

    // Symbol 0 (3 × 2) at S = 5, directly followed by symbol 2 (3 × 3).
    let instances = vec![(0, 1), (2, 0)];

    for transposed in [false, true] {
        for corner in 0..4_u8 {
            let layout = TextLayout {
                corner,
                transposed,
                strip_t: 9,
                first_s: 5,
                instances: instances.clone(),
            };

            let data = file(
                1,
                &[
                    segment(0, PAGE_INFORMATION).data(&PageInfo::new(20, 20).data()),
                    segment(1, SYMBOL_DICTIONARY).data(&dictionary),
                    segment(2, IMMEDIATE_TEXT_REGION)
                        .refers_to(&[1])
                        .data(&text_region(20, 20, &layout, 2)),
                    segment(3, END_OF_PAGE).data(&[]),
                ],
            );

            let expected = place_symbols(&symbols, &layout, 20, 20);
            compare(&decode(&data)?, &expected)
                .map_err(|err| format!("corner {corner}, transposed {transposed}: {err}"))?;
        }
    }

    Ok(())
}

/// Where the instances of a single strip end up (6.4.5).
fn place_symbols(symbols: &[Bitmap], layout: &TextLayout, width: u32, height: u32) -> Bitmap {
    let mut page = Bitmap::new(width, height);
    let mut s = layout.first_s;
    let t = layout.strip_t;
    // 0 is the bottom left corner, 1 top left, 2 bottom right, 3 top right.
    let left = layout.corner < 2;
    let top = layout.corner % 2 == 1;

    for &(id, gap) in &layout.instances {
        let symbol = &symbols[id as usize];
        let (w, h) = (symbol.width() as i32, symbol.height() as i32);

        if layout.transposed {
            // S runs down the page; T is the left or right edge.
            let x = if left { t } else { t - w + 1 };
            draw(&mut page, symbol, x, s);
            s += h - 1 + gap;
        } else {
            // S runs across the page; T is the top or bottom edge.
            let y = if top { t } else { t - h + 1 };
            draw(&mut page, symbol, s, y);
            s += w - 1 + gap;
        }
    }

    page
}

fn text_with_globals() -> TestResult {
    let symbols = text_symbols();
    let layout = TextLayout {
        corner: 1,
        transposed: false,
        strip_t: 2,
        first_s: 1,
        instances: vec![(1, 2), (0, 1), (2, 0)],
    };

    let globals = embedded(&[segment(0, SYMBOL_DICTIONARY)
        .page(0)
        .data(&symbol_dictionary(&symbols))]);
    let data = embedded(&[
        segment(1, PAGE_INFORMATION).data(&PageInfo::new(16, 8).data()),
        segment(2, IMMEDIATE_TEXT_REGION)
            .refers_to(&[0])
            .data(&text_region(16, 8, &layout, 2)),
        segment(3, END_OF_PAGE).data(&[]),
    ]);

    let expected = place_symbols(&symbols, &layout, 16, 8);
    let image = jbig2_decode::decode_embedded(&data, Some(&globals))
        .map_err(|err| format!("decode failed: {err}"))?;
    compare(&image, &expected)?;

    // Without its globals, the text region refers to nothing.
    match jbig2_decode::decode(&data) {
        Err(err) if err.kind() == ErrorKind::UnsupportedReference => Ok(()),
        other => Err(format!("expected a missing reference, got {other:?}")),
    }
}

// Symbol dictionaries.

/// The refinement AT pixels of template 0, at their nominal place.
const REFINEMENT_AT: [(i32, i32); 2] = [(-1, -1), (-1, -1)];

/// An arithmetic coded dictionary with refinement/aggregate coding, on top
/// of the three `text_symbols`. The first new symbol refines symbol 0; the
/// second aggregates the first new symbol and a refined symbol 2.
fn refine_aggregate_dictionary(first: &Bitmap, refined: &Bitmap, aggregate: &Bitmap) -> Vec<u8> {
    let inputs = text_symbols();

    let mut data = 0x0002_u16.to_be_bytes().to_vec();
    data.extend(at_bytes(nominal_at(0)));
    data.extend(at_bytes(&REFINEMENT_AT));
    data.extend(2_u32.to_be_bytes());
    data.extend(2_u32.to_be_bytes());

    let mut encoder = ArithmeticEncoder::new();
    let mut rcx = contexts(1 << 13);
    let [
        mut iadh,
        mut iadw,
        mut iaex,
        mut iaai,
        mut iadt,
        mut iafs,
        mut iads,
        mut iari,
        mut iardw,
        mut iardh,
        mut iardx,
        mut iardy,
    ] = std::array::from_fn::<_, 12, _>(|_| IntegerEncoder::new());
    // Five symbols in total.
    let mut iaid = SymbolIdEncoder::new(3);

    // Height class 2: a single refinement of symbol 0.
    iadh.encode(&mut encoder, 2);
    iadw.encode(&mut encoder, 3);
    iaai.encode(&mut encoder, 1);
    iaid.encode(&mut encoder, 0);
    iardx.encode(&mut encoder, 0);
    iardy.encode(&mut encoder, 0);
    encode_refinement(&mut encoder, &mut rcx, first, &inputs[0], 0, false);
    iadw.encode_oob(&mut encoder);

    // Height class 3: an aggregate of two instances in a single strip.
    iadh.encode(&mut encoder, 1);
    iadw.encode(&mut encoder, aggregate.width() as i32);
    iaai.encode(&mut encoder, 2);
    iadt.encode(&mut encoder, 0);
    iadt.encode(&mut encoder, 0);
    iafs.encode(&mut encoder, 0);

    iaid.encode(&mut encoder, 3);
    iari.encode(&mut encoder, 0);
    iads.encode(&mut encoder, 1);

    iaid.encode(&mut encoder, 2);
    iari.encode(&mut encoder, 1);
    for rd in [&mut iardw, &mut iardh, &mut iardx, &mut iardy] {
        rd.encode(&mut encoder, 0);
    }
    encode_refinement(&mut encoder, &mut rcx, refined, &inputs[2], 0, false);
    iads.encode_oob(&mut encoder);
    iadw.encode_oob(&mut encoder);

    // Skip the inputs, export both new symbols.
    iaex.encode(&mut encoder, 3);
    iaex.encode(&mut encoder, 2);

    data.extend(encoder.finish());
    data
}

/// A Huffman coded dictionary with refinement/aggregate coding and
/// refinement template 1, whose only symbol refines symbol 0 of the three
/// `text_symbols`.
fn huffman_refinement_dictionary(symbol: &Bitmap) -> Vec<u8> {
    let inputs = text_symbols();

    let mut data = 0x1003_u16.to_be_bytes().to_vec();
    data.extend(1_u32.to_be_bytes());
    data.extend(1_u32.to_be_bytes());

    let mut encoder = ArithmeticEncoder::new();
    let mut cx = contexts(1 << 10);
    encode_refinement(&mut encoder, &mut cx, symbol, &inputs[0], 1, false);
    let bitmap = encoder.finish();

    let mut writer = BitWriter::default();
    // HCDH 2 (B.4), DW 3 (B.2), REFAGGNINST 1 (B.1).
    writer.write(2, 0b10);
    writer.write(7, 0b1110_000);
    write_b1(&mut writer, 1);
    // Symbol ID 0 in two bits, RDX 0 and RDY 0 (B.15).
    writer.write(2, 0b00);
    writer.write(2, 0b00);
    write_b1(&mut writer, bitmap.len() as u16);
    writer.bytes(&bitmap);
    // OOB ends the height class.
    writer.write(6, 0b111111);
    // Skip the inputs, export the new symbol.
    write_b1(&mut writer, 3);
    write_b1(&mut writer, 1);

    data.extend(writer.finish());
    data
}

fn symbol_refine_aggregate() -> TestResult {
    let first = bitmap(&["###", "#.#"]);
    let refined = bitmap(&["##.", "###", ".##"]);
    let mut aggregate = Bitmap::new(6, 3);
    draw(&mut aggregate, &first, 0, 0);
    draw(&mut aggregate, &refined, 3, 0);
    let huffman = bitmap(&[".##", "#.."]);

    let layout = TextLayout {
        corner: 1,
        transposed: false,
        strip_t: 0,
        first_s: 0,
        instances: vec![(0, 1), (1, 1), (2, 0)],
    };

    let data = file(
        1,
        &[
            segment(0, PAGE_INFORMATION).data(&PageInfo::new(14, 4).data()),
            segment(1, SYMBOL_DICTIONARY).data(&symbol_dictionary(&text_symbols())),
            segment(2, SYMBOL_DICTIONARY)
                .refers_to(&[1])
                .data(&refine_aggregate_dictionary(&first, &refined, &aggregate)),
            segment(3, SYMBOL_DICTIONARY)
                .refers_to(&[1])
                .data(&huffman_refinement_dictionary(&huffman)),
            segment(4, IMMEDIATE_TEXT_REGION)
                .refers_to(&[2, 3])
                .data(&text_region(14, 4, &layout, 2)),
            segment(5, END_OF_PAGE).data(&[]),
        ],
    );

    let expected = place_symbols(&[first, aggregate, huffman], &layout, 14, 4);
    compare(&decode(&data)?, &expected)
}

// Halftone regions.

fn halftone_patterns() -> TestResult {
    // Pattern `g` has its first `g` pixels set, in row-major order.
    let mut collective = Bitmap::new(8, 2);
    for gray in 0..4 {
        for p in 0..gray {
            collective.set_pixel(gray * 2 + p % 2, p / 2, true);
        }
    }

    let pattern_at = [(-2, 0), (-3, -1), (2, -2), (-2, -2)];
    let mut dictionary = vec![0x00, 2, 2];
    dictionary.extend(3_u32.to_be_bytes());
    let mut encoder = ArithmeticEncoder::new();
    let mut cx = contexts(generic_context_count(0));
    encode_generic(&mut encoder, &mut cx, &collective, 0, false, &pattern_at);
    dictionary.extend(encoder.finish());

    let gray = |m: u32, n: u32| (m + n) % 4;

    let mut region = region_info(8, 8, 0, 0, OR);
    region.push(0x00);
    region.extend(4_u32.to_be_bytes());
    region.extend(4_u32.to_be_bytes());
    region.extend(0_i32.to_be_bytes());
    region.extend(0_i32.to_be_bytes());
    region.extend(512_u16.to_be_bytes());
    region.extend(0_u16.to_be_bytes());

    // Gray-coded bit planes, most significant first (C.5).
    let mut encoder = ArithmeticEncoder::new();
    let mut cx = contexts(generic_context_count(0));
    for plane in (0..2).rev() {
        let mut bits = Bitmap::new(4, 4);
        for m in 0..4 {
            for n in 0..4 {
                let value = gray(m, n);
                let bit = ((value >> plane) ^ (value >> (plane + 1))) & 1;
                bits.set_pixel(n, m, bit == 1);
            }
        }
        encode_generic(&mut encoder, &mut cx, &bits, 0, false, nominal_at(0));
    }
    region.extend(encoder.finish());

    let data = file(
        1,
        &[
            segment(0, PAGE_INFORMATION).data(&PageInfo::new(8, 8).data()),
            segment(1, PATTERN_DICTIONARY).data(&dictionary),
            segment(2, IMMEDIATE_HALFTONE_REGION)
                .refers_to(&[1])
                .data(&region),
            segment(3, END_OF_PAGE).data(&[]),
        ],
    );

    let mut expected = Bitmap::new(8, 8);
    for m in 0..4 {
        for n in 0..4 {
            for p in 0..gray(m, n) {
                expected.set_pixel(2 * n + p % 2, 2 * m + p / 2, true);
            }
        }
    }

    compare(&decode(&data)?, &expected)
}

// Pages.

fn striped_page() -> TestResult {
    let top = noise(12, 4, 21);
    let bottom = noise(12, 4, 22);

    let info = PageInfo {
        striped: Some(4),
        ..PageInfo::new(12, 0xFFFF_FFFF)
    };

    let data = file(
        1,
        &[
            segment(0, PAGE_INFORMATION).data(&info.data()),
            segment(1, IMMEDIATE_GENERIC_REGION).data(&generic_region(
                &top,
                (0, 0),
                OR,
                &GenericCoding::nominal(3),
            )),
            segment(2, END_OF_STRIPE).data(&3_u32.to_be_bytes()),
            segment(3, IMMEDIATE_GENERIC_REGION).data(&generic_region(
                &bottom,
                (0, 4),
                OR,
                &GenericCoding::nominal(3),
            )),
            segment(4, END_OF_STRIPE).data(&7_u32.to_be_bytes()),
            segment(5, END_OF_PAGE).data(&[]),
        ],
    );

    let mut expected = Bitmap::new(12, 8);
    draw(&mut expected, &top, 0, 0);
    draw(&mut expected, &bottom, 0, 4);

    compare(&decode(&data)?, &expected)
}

fn default_pixel_page() -> TestResult {
    // A black page with the default operator AND: white region pixels punch
    // holes into it.
    let region = noise(6, 5, 8);
    let info = PageInfo {
        default_pixel: true,
        default_operator: 1,
        ..PageInfo::new(10, 10)
    };

    let data = file(
        1,
        &[
            segment(0, PAGE_INFORMATION).data(&info.data()),
            segment(1, IMMEDIATE_GENERIC_REGION).data(&generic_region(
                &region,
                (2, 3),
                OR,
                &GenericCoding::nominal(0),
            )),
            segment(2, END_OF_PAGE).data(&[]),
        ],
    );

    let mut expected = Bitmap::filled(10, 10, true);
    for y in 0..5 {
        for x in 0..6 {
            expected.set_pixel(x + 2, y + 3, region.get_pixel(x, y));
        }
    }

    compare(&decode(&data)?, &expected)
}

fn multiple_pages() -> TestResult {
    let first = noise(9, 7, 31);
    let second = noise(13, 5, 32);

    let data = file(
        2,
        &[
            segment(0, PAGE_INFORMATION).data(&PageInfo::new(9, 7).data()),
            segment(1, IMMEDIATE_GENERIC_REGION).data(&generic_region(
                &first,
                (0, 0),
                OR,
                &GenericCoding::nominal(1),
            )),
            segment(2, END_OF_PAGE).data(&[]),
            segment(3, PAGE_INFORMATION)
                .page(2)
                .data(&PageInfo::new(13, 5).data()),
            segment(4, IMMEDIATE_GENERIC_REGION)
                .page(2)
                .data(&generic_region(&second, (0, 0), OR, &GenericCoding::nominal(2))),
            segment(5, END_OF_PAGE).page(2).data(&[]),
            segment(6, END_OF_FILE).page(0).data(&[]),
        ],
    );

    let mut document = Document::new(&data).map_err(|err| format!("parse failed: {err}"))?;

    if document.page_numbers() != [1, 2] {
        return Err(format!("unexpected pages {:?}", document.page_numbers()));
    }

    // Decoding out of order, and twice.
    for number in [2, 1, 2] {
        let expected = if number == 1 { &first } else { &second };
        let page = document
            .page(number)
            .map_err(|err| format!("page {number}: {err}"))?;
        compare(&page, expected).map_err(|err| format!("page {number}: {err}"))?;
    }

    document.clean();

    expect_error(
        document.page(3),
        DecodeError::Format(FormatError::MissingPage),
    )
}

// Errors.

fn unknown_segment_type() -> TestResult {
    let data = file(
        1,
        &[
            segment(0, PAGE_INFORMATION).data(&PageInfo::new(8, 8).data()),
            segment(1, 1).data(&[0; 4]),
        ],
    );

    match jbig2_decode::decode(&data) {
        Err(err) if err.kind() == ErrorKind::UnsupportedReference => Ok(()),
        other => Err(format!("expected an unknown segment type, got {other:?}")),
    }
}

fn forward_reference() -> TestResult {
    let bitmap = noise(8, 8, 2);
    let data = file(
        1,
        &[
            segment(0, PAGE_INFORMATION).data(&PageInfo::new(8, 8).data()),
            segment(1, IMMEDIATE_GENERIC_REGION)
                .refers_to(&[2])
                .data(&generic_region(&bitmap, (0, 0), OR, &GenericCoding::nominal(0))),
            segment(2, END_OF_PAGE).data(&[]),
        ],
    );

    expect_error(
        jbig2_decode::decode(&data),
        DecodeError::Segment(SegmentError::InvalidReference),
    )
}

fn missing_page_information() -> TestResult {
    let bitmap = noise(8, 8, 2);
    let data = embedded(&[segment(0, IMMEDIATE_GENERIC_REGION).data(&generic_region(
        &bitmap,
        (0, 0),
        OR,
        &GenericCoding::nominal(0),
    ))]);

    expect_error(
        jbig2_decode::decode(&data),
        DecodeError::Format(FormatError::MissingPageInfo),
    )
}

fn pixel_limit() -> TestResult {
    let data = single_region_file(&noise(37, 23, 7), &GenericCoding::nominal(0));
    let settings = DecodeSettings {
        max_pixels: 500,
        ..DecodeSettings::default()
    };

    let mut document =
        Document::with_globals(&data, None, settings).map_err(|err| format!("{err}"))?;
    let result = document.page(1);

    match &result {
        Err(err) if err.kind() == ErrorKind::Overflow => {}
        _ => return Err(format!("expected the pixel limit to be hit, got {result:?}")),
    }

    expect_error(result, DecodeError::LimitExceeded)
}

// Concurrency.

fn concurrent_decoding() -> TestResult {
    let symbols = text_symbols();
    let layout = TextLayout {
        corner: 0,
        transposed: false,
        strip_t: 6,
        first_s: 0,
        instances: vec![(0, 2), (1, 2), (2, 2), (0, 0)],
    };

    let data = file(
        1,
        &[
            segment(0, PAGE_INFORMATION).data(&PageInfo::new(20, 8).data()),
            segment(1, SYMBOL_DICTIONARY).data(&symbol_dictionary(&symbols)),
            segment(2, IMMEDIATE_TEXT_REGION)
                .refers_to(&[1])
                .data(&text_region(20, 8, &layout, 2)),
            segment(3, END_OF_PAGE).data(&[]),
        ],
    );

    let expected = place_symbols(&symbols, &layout, 20, 8);

    let images: Vec<Image> = (0..32)
        .into_par_iter()
        .map(|_| decode(&data))
        .collect::<Result<_, _>>()?;

    for image in &images {
        compare(image, &expected)?;
    }

    Ok(())
}
