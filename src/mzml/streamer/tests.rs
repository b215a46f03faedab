use super::*;
use crate::mzml::models::ArrayRole;
use std::io::BufReader;

const MINIMAL_MZML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<mzML xmlns="http://psi.hupo.org/ms/mzml" version="1.1.0">
  <run id="test_run">
    <spectrumList count="2">
      <spectrum index="0" id="scan=1" defaultArrayLength="2">
        <cvParam cvRef="MS" accession="MS:1000511" name="ms level" value="1"/>
        <cvParam cvRef="MS" accession="MS:1000130" name="positive scan"/>
        <scanList count="1">
          <scan>
            <cvParam cvRef="MS" accession="MS:1000016" name="scan start time" value="60.0" unitCvRef="UO" unitAccession="UO:0000010" unitName="second"/>
          </scan>
        </scanList>
        <binaryDataArrayList count="2">
          <binaryDataArray>
            <cvParam cvRef="MS" accession="MS:1000523" name="64-bit float"/>
            <cvParam cvRef="MS" accession="MS:1000576" name="no compression"/>
            <cvParam cvRef="MS" accession="MS:1000514" name="m/z array"/>
            <binary>AAAAAAAAWUAAAAAAAABpQA==</binary>
          </binaryDataArray>
          <binaryDataArray>
            <cvParam cvRef="MS" accession="MS:1000521" name="32-bit float"/>
            <cvParam cvRef="MS" accession="MS:1000576" name="no compression"/>
            <cvParam cvRef="MS" accession="MS:1000515" name="intensity array"/>
            <binary>AADIQgAASEM=</binary>
          </binaryDataArray>
        </binaryDataArrayList>
      </spectrum>
      <spectrum index="1" id="scan=2" defaultArrayLength="0">
        <cvParam cvRef="MS" accession="MS:1000511" name="ms level" value="2"/>
        <scanList count="1">
          <scan>
            <cvParam cvRef="MS" accession="MS:1000016" name="scan start time" value="1.25" unitCvRef="UO" unitAccession="UO:0000031" unitName="minute"/>
          </scan>
        </scanList>
        <precursorList count="1">
          <precursor>
            <activation>
              <cvParam cvRef="MS" accession="MS:1000511" name="ms level" value="7"/>
            </activation>
          </precursor>
        </precursorList>
      </spectrum>
    </spectrumList>
  </run>
</mzML>"#;

fn streamer(xml: &str) -> MzMLStreamer<BufReader<std::io::Cursor<Vec<u8>>>> {
    MzMLStreamer::new(BufReader::new(std::io::Cursor::new(xml.as_bytes().to_vec())))
}

#[test]
fn test_parse_minimal_mzml() {
    let mut streamer = streamer(MINIMAL_MZML);

    let raw = streamer.next_raw_spectrum().unwrap().unwrap();
    assert_eq!(streamer.run_id(), Some("test_run"));
    assert_eq!(streamer.spectrum_count(), Some(2));
    assert_eq!(raw.index, 0);
    assert_eq!(raw.id, "scan=1");
    assert_eq!(raw.ms_level, 1);
    assert!((raw.retention_time.unwrap() - 1.0).abs() < 1e-12);
    assert_eq!(raw.mz_data.as_ref().unwrap().role, ArrayRole::Mz);

    let scan = raw.decode().unwrap();
    assert_eq!(scan.len(), 2);
    assert!((scan.mz()[0] - 100.0).abs() < 0.001);
    assert!((scan.mz()[1] - 200.0).abs() < 0.001);
    assert!((scan.intensity()[0] - 100.0).abs() < 0.001);
    assert!((scan.intensity()[1] - 200.0).abs() < 0.001);
}

#[test]
fn test_precursor_params_do_not_leak() {
    let mut streamer = streamer(MINIMAL_MZML);
    streamer.next_raw_spectrum().unwrap();
    let raw = streamer.next_raw_spectrum().unwrap().unwrap();
    assert_eq!(raw.ms_level, 2);
    assert_eq!(raw.retention_time, Some(1.25));
    assert!(raw.mz_data.is_none());

    assert!(streamer.next_raw_spectrum().unwrap().is_none());
    assert!(streamer.next_raw_spectrum().unwrap().is_none());
}

#[test]
fn test_iterator_counts_spectra() {
    let spectra: Vec<_> = streamer(MINIMAL_MZML).raw_spectra().collect();
    assert_eq!(spectra.len(), 2);
    assert!(spectra.iter().all(|s| s.is_ok()));
}

#[test]
fn test_missing_spectrum_list_is_invalid() {
    let xml = r#"<?xml version="1.0"?><mzML><run id="r"></run></mzML>"#;
    let err = streamer(xml).next_raw_spectrum().unwrap_err();
    assert!(matches!(err, ParseError::InvalidStructure(_)));
}

#[test]
fn test_not_xml_is_invalid() {
    assert!(streamer("this is not an mzML file").next_raw_spectrum().is_err());
}

#[test]
fn test_empty_spectrum_list() {
    let xml = r#"<mzML><run id="r"><spectrumList count="0"/></run></mzML>"#;
    let mut streamer = streamer(xml);
    assert!(streamer.next_raw_spectrum().unwrap().is_none());
    assert_eq!(streamer.spectrum_count(), Some(0));
}

#[test]
fn test_truncated_document_fuses_iterator() {
    let cut = MINIMAL_MZML.find("<binaryDataArrayList").unwrap();
    let mut iter = streamer(&MINIMAL_MZML[..cut]).raw_spectra();
    assert!(matches!(iter.next(), Some(Err(_))));
    assert!(iter.next().is_none());
}
