#![no_main]

use libfuzzer_sys::fuzz_target;
use mzquant::mzml::MzMLStreamer;
use mzquant::store::{ScanIterator, ScanStoreOptions};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Malformed documents must end the iteration with an error, never panic
    let options = ScanStoreOptions {
        ms_level: None,
        ..Default::default()
    };
    let scans = ScanIterator::new(MzMLStreamer::new(Cursor::new(data)), options);

    for scan in scans.take(100) {
        match scan {
            Ok(scan) => {
                assert_eq!(scan.mz().len(), scan.intensity().len());
                assert!(scan.mz().windows(2).all(|w| !(w[0] > w[1])));
            }
            Err(_) => break,
        }
    }
});
