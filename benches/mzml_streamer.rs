use std::io::{BufReader, Cursor, Write};
use std::sync::Arc;

use base64::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use mzquant::mzml::MzMLStreamer;
use mzquant::store::{ScanIterator, ScanStore, ScanStoreOptions};

fn encode_array(bytes: Vec<u8>, zlib: bool) -> String {
    if !zlib {
        return BASE64_STANDARD.encode(bytes);
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(&bytes).unwrap();
    BASE64_STANDARD.encode(encoder.finish().unwrap())
}

/// An LC run: one MS1 survey scan followed by four MS2 scans, intensities
/// zlib-compressed on MS1 only, retention time in seconds
fn synthetic_run(num_spectra: usize, points: usize) -> Vec<u8> {
    let mut doc = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <mzML xmlns=\"http://psi.hupo.org/ms/mzml\" version=\"1.1.0\">\n\
         <run id=\"bench_run\">\n<spectrumList count=\"{num_spectra}\">"
    );

    for i in 0..num_spectra {
        let survey = i % 5 == 0;
        let seconds = i as f64 * 0.5;
        let elution = (-((seconds - num_spectra as f64 * 0.25) / 30.0).powi(2)).exp();

        let mz: Vec<u8> = (0..points)
            .flat_map(|j| (60.0 + j as f64 * 4.0).to_le_bytes())
            .collect();
        let intensity: Vec<u8> = (0..points)
            .flat_map(|j| {
                let signal = if j % 25 == 0 { 1e6 * elution } else { 0.0 };
                (signal as f32 + 250.0).to_le_bytes()
            })
            .collect();

        let (compression, name) = if survey {
            ("MS:1000574", "zlib compression")
        } else {
            ("MS:1000576", "no compression")
        };
        doc.push_str(&format!(
            r#"
      <spectrum index="{i}" id="scan={scan}" defaultArrayLength="{points}">
        <cvParam cvRef="MS" accession="MS:1000511" name="ms level" value="{level}"/>
        <scanList count="1">
          <scan>
            <cvParam cvRef="MS" accession="MS:1000016" name="scan start time" value="{seconds}" unitCvRef="UO" unitAccession="UO:0000010" unitName="second"/>
          </scan>
        </scanList>
        <binaryDataArrayList count="2">
          <binaryDataArray>
            <cvParam cvRef="MS" accession="MS:1000523" name="64-bit float"/>
            <cvParam cvRef="MS" accession="MS:1000576" name="no compression"/>
            <cvParam cvRef="MS" accession="MS:1000514" name="m/z array"/>
            <binary>{mz}</binary>
          </binaryDataArray>
          <binaryDataArray>
            <cvParam cvRef="MS" accession="MS:1000521" name="32-bit float"/>
            <cvParam cvRef="MS" accession="{compression}" name="{name}"/>
            <cvParam cvRef="MS" accession="MS:1000515" name="intensity array"/>
            <binary>{intensity}</binary>
          </binaryDataArray>
        </binaryDataArrayList>
      </spectrum>"#,
            scan = i + 1,
            level = if survey { 1 } else { 2 },
            mz = encode_array(mz, false),
            intensity = encode_array(intensity, survey),
        ));
    }

    doc.push_str("\n</spectrumList>\n</run>\n</mzML>");
    doc.into_bytes()
}

fn bench_next_raw_spectrum(c: &mut Criterion) {
    let mut group = c.benchmark_group("mzml_streamer_next_raw_spectrum");

    for num_spectra in [100, 500, 1000] {
        let peaks_per_spectrum = 50;
        let total_peaks = num_spectra * peaks_per_spectrum;
        let mzml_bytes = Arc::new(synthetic_run(num_spectra, peaks_per_spectrum));

        group.throughput(Throughput::Elements(total_peaks as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_spectra),
            &mzml_bytes,
            |b, bytes| {
                b.iter_batched(
                    || MzMLStreamer::new(BufReader::new(Cursor::new(bytes.as_ref().clone()))),
                    |mut streamer| {
                        let mut count = 0usize;
                        while let Some(raw) = streamer.next_raw_spectrum().unwrap() {
                            count += raw.default_array_length;
                        }
                        black_box(count);
                    },
                    BatchSize::LargeInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_scan_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_decoding");
    let num_spectra = 1000;
    let peaks_per_spectrum = 200;
    let mzml_bytes = Arc::new(synthetic_run(num_spectra, peaks_per_spectrum));
    group.throughput(Throughput::Elements((num_spectra * peaks_per_spectrum) as u64));

    let options = ScanStoreOptions {
        ms_level: None,
        ..Default::default()
    };

    group.bench_function("sequential_iterator", |b| {
        b.iter_batched(
            || MzMLStreamer::new(BufReader::new(Cursor::new(mzml_bytes.as_ref().clone()))),
            |streamer| {
                let count = ScanIterator::new(streamer, options.clone())
                    .map(|scan| scan.unwrap().len())
                    .sum::<usize>();
                black_box(count);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("parallel_batches", |b| {
        b.iter_batched(
            || MzMLStreamer::new(BufReader::new(Cursor::new(mzml_bytes.as_ref().clone()))),
            |streamer| {
                let collection = ScanStore::load_from(streamer, &options).unwrap();
                black_box(collection.scans.len());
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_next_raw_spectrum, bench_scan_decoding);
criterion_main!(benches);
