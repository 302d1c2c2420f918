//! Integration tests: JSON-backed sources, sibling lookup and lazy loading.

use std::path::PathBuf;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use pit_hist::{DataSource, Distribution, HistKey, HistogramFile, JsonFileSource, Transform};

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("pit_hist_{}_{}_{}", std::process::id(), nanos, name));
    std::fs::create_dir_all(&p).unwrap();
    p
}

fn dist(name: &str, cells: &[f64]) -> Distribution {
    let n = cells.len() - 2;
    let edges = pit_hist::uniform_edges(n, 0.0, 10.0 * n as f64);
    let variance = cells.iter().map(|c| c * 0.5).collect();
    Distribution::new(name, edges, cells.to_vec(), variance).unwrap()
}

#[test]
fn json_source_roundtrip_through_histkey() {
    let dir = tmp_dir("roundtrip");
    let path = dir.join("tt.json");
    let nominal = dist("mjj", &[1.0, 10.0, 20.0, 10.0, 2.0]);
    HistogramFile::from_distributions([&nominal]).write(&path).unwrap();

    let src = Rc::new(JsonFileSource::new(&path));
    assert!(!src.is_open());

    let key = HistKey::new(src.clone(), "mjj", Transform::default());
    let loaded = key.load().unwrap();
    assert_eq!(*loaded, nominal);
    assert!(src.is_open());

    // range restriction folds the flows
    let folded = HistKey::new(
        src.clone(),
        "mjj",
        Transform { x_range: Some((0.0, 30.0)), ..Default::default() },
    );
    assert_eq!(folded.load().unwrap().contents(), &[0.0, 11.0, 20.0, 12.0, 0.0]);

    assert!(src.close());
    assert!(!src.is_open());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn json_sibling_is_found_next_to_nominal_file() {
    let dir = tmp_dir("sibling");
    let nominal = dist("mjj", &[0.0, 10.0, 0.0]);
    let varied = dist("mjj", &[0.0, 12.0, 0.0]);
    HistogramFile::from_distributions([&nominal]).write(&dir.join("tt.json")).unwrap();
    HistogramFile::from_distributions([&varied]).write(&dir.join("tt__jesup.json")).unwrap();

    let src = JsonFileSource::new(dir.join("tt.json"));
    let up = src.sibling("__jesup").unwrap().expect("sibling file exists");
    assert!(up.contains("mjj").unwrap());
    assert_eq!(up.fetch("mjj").unwrap().unwrap().visible_contents(), &[12.0]);
    assert!(src.sibling("__jesdown").unwrap().is_none());

    // the same sibling handle is reused
    let again = src.sibling("__jesup").unwrap().unwrap();
    assert!(Rc::ptr_eq(&up, &again));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn unreadable_file_is_data_unavailable() {
    let dir = tmp_dir("missing");
    let src = Rc::new(JsonFileSource::new(dir.join("nope.json")));
    let key = HistKey::new(src, "mjj", Transform::default());
    let err = key.load().unwrap_err();
    assert!(err.is_data_unavailable(), "unexpected error: {err}");

    std::fs::write(dir.join("bad.json"), b"{\"histograms\": {\"mjj\": {\"bin_edges\": [0.0, 1.0], \"contents\": [1.0]}}}").unwrap();
    let src = Rc::new(JsonFileSource::new(dir.join("bad.json")));
    let err = HistKey::new(src, "mjj", Transform::default()).load().unwrap_err();
    assert!(err.is_data_unavailable(), "unexpected error: {err}");
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn release_drops_the_document_and_its_siblings() {
    let dir = tmp_dir("release");
    let nominal = dist("mjj", &[0.0, 10.0, 0.0]);
    let varied = dist("mjj", &[0.0, 12.0, 0.0]);
    HistogramFile::from_distributions([&nominal]).write(&dir.join("tt.json")).unwrap();
    HistogramFile::from_distributions([&varied]).write(&dir.join("tt__jesup.json")).unwrap();

    let src = JsonFileSource::new(dir.join("tt.json"));
    assert!(!src.release());
    assert!(src.contains("mjj").unwrap());
    let up = src.sibling("__jesup").unwrap().unwrap();
    assert!(up.contains("mjj").unwrap());

    assert!(src.release());
    assert!(!src.is_open());
    assert!(!up.release());

    // nothing stays resident: the next read goes back to disk
    std::fs::remove_file(dir.join("tt__jesup.json")).unwrap();
    assert!(up.fetch("mjj").is_err());
    assert_eq!(src.fetch("mjj").unwrap().unwrap(), nominal);
    std::fs::remove_dir_all(&dir).ok();
}
