//! End-to-end: YAML configuration, JSON histogram files, chunked batch.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use approx::assert_relative_eq;
use pit_core::Error;
use pit_hist::{Distribution, HistogramFile};
use pit_stack::{
    BindOptions, PlotItConfig, PlotStacks, SampleEntry, StackComponent, load_samples,
    make_stack_plots, make_stack_ratio_plots, release_sources,
};

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("pit_stack_{}_{}_{}", std::process::id(), nanos, name));
    std::fs::create_dir_all(p.join("histos")).unwrap();
    p
}

fn h(name: &str, counts: &[f64]) -> Distribution {
    Distribution::uniform(name, 0.0, counts.len() as f64, counts).unwrap()
}

fn write(dir: &Path, file: &str, hists: &[Distribution]) {
    HistogramFile::from_distributions(hists).write(&dir.join("histos").join(file)).unwrap();
}

const CONFIG: &str = r#"
configuration:
  luminosity: 1
  luminosity-error: 0.1
  root: histos
files:
  data.json:
    type: DATA
  tt.json:
    cross-section: 1
    generated-events: 1
    order: 2
  dy.json:
    cross-section: 1
    generated-events: 1
    group: ewk
groups:
  ewk:
    legend: "Electroweak"
plots:
  mjj:
    systematics: [jes]
  mll: {}
  njets: {}
systematics:
  - jes
"#;

/// `dy.json` has no `mll`, only `tt.json` has `jes` alternates (for `mjj`).
fn fixture(name: &str, config: &str) -> (PathBuf, PlotItConfig) {
    let dir = tmp_dir(name);
    std::fs::write(dir.join("plots.yml"), config).unwrap();
    write(&dir, "data.json", &[h("mjj", &[14.0, 26.0]), h("mll", &[3.0, 4.0]), h("njets", &[1.0, 1.0])]);
    write(
        &dir,
        "tt.json",
        &[
            h("mjj", &[10.0, 20.0]),
            h("mjj__jesup", &[12.0, 20.0]),
            h("mjj__jesdown", &[9.0, 21.0]),
            h("mll", &[2.0, 2.0]),
            h("njets", &[1.0, 0.0]),
        ],
    );
    write(&dir, "dy.json", &[h("mjj", &[5.0, 5.0]), h("njets", &[0.0, 1.0])]);
    let cfg = PlotItConfig::from_path(&dir.join("plots.yml")).unwrap();
    (dir, cfg)
}

#[test]
fn samples_are_resolved_from_the_configuration() {
    let (dir, cfg) = fixture("samples", CONFIG);
    let samples = load_samples(&cfg, &dir, None).unwrap();
    let names: Vec<_> = samples.iter().map(SampleEntry::name).collect();
    assert_eq!(names, ["tt.json", "data.json", "ewk"]);

    let stacks = PlotStacks::build(&cfg.plots["mjj"], &samples, BindOptions::default()).unwrap();
    assert_eq!(stacks.observed.len(), 1);
    assert_eq!(stacks.expected.len(), 2);
    assert!(stacks.signals.is_empty());
    assert_eq!(stacks.expected.entries()[1].name(), "ewk");
    assert_eq!(stacks.expected.entries()[1].style().legend.as_deref(), Some("Electroweak"));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn chunked_batch_survives_failed_loads_and_renders() {
    let (dir, cfg) = fixture("batch", CONFIG);
    let samples = load_samples(&cfg, &dir, None).unwrap();
    let stacks: Vec<_> = cfg
        .plot_list()
        .iter()
        .map(|p| PlotStacks::build(p, &samples, BindOptions::default()).unwrap())
        .collect();

    let mut drawn = Vec::new();
    let mut renderer = |p: &PlotStacks| -> pit_core::Result<()> {
        let selected = p.expected.systematic_band(p.systematic_names())?;
        let all = p.expected.systematic_band(None)?;
        let ratio = p.ratio()?;
        drawn.push((p.plot.name.clone(), selected.errors, all.errors, ratio.y));
        Ok(())
    };
    let report = make_stack_plots(&stacks, &mut renderer, 1).unwrap();

    // mjj: data, tt + 2 alternates, dy; mll: data, tt, dy fails; njets: data, tt, dy
    assert_eq!(report.loaded, 10);
    assert_eq!(report.failed, 1);
    assert_eq!(report.cleared, 10);
    assert_eq!(report.drawn, 2);
    assert_eq!(report.render_failures.len(), 1);
    assert_eq!(report.render_failures[0].0, "mll");

    assert_eq!(drawn.len(), 2);
    let (name, selected, all, ratio) = &drawn[0];
    assert_eq!(name, "mjj");
    assert_eq!(selected, &vec![2.0, 1.0]);
    // lumi: 1.0 + 0.5 and 2.0 + 0.5; jes: 2 and 1
    assert_relative_eq!(all[0], (1.5f64 * 1.5 + 4.0).sqrt(), epsilon = 1e-9);
    assert_relative_eq!(all[1], (2.5f64 * 2.5 + 1.0).sqrt(), epsilon = 1e-9);
    assert_relative_eq!(ratio[0], 14.0 / 15.0, epsilon = 1e-12);
    assert_eq!(drawn[1].0, "njets");

    for plot in &stacks {
        assert!(plot.leaves().flat_map(|l| l.keys()).all(|k| !k.is_loaded()));
    }
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn released_chunks_keep_no_source_data() {
    let (dir, cfg) = fixture("release", CONFIG);
    let samples = load_samples(&cfg, &dir, None).unwrap();
    let stacks: Vec<_> = cfg
        .plot_list()
        .iter()
        .map(|p| PlotStacks::build(p, &samples, BindOptions::default()).unwrap())
        .collect();
    // binding the shape alternates read the files; building closed them again
    assert_eq!(release_sources(stacks.iter().flat_map(|p| p.leaves())), 0);

    let mut renderer = |_: &PlotStacks| -> pit_core::Result<()> { Ok(()) };
    let report = make_stack_plots(&stacks, &mut renderer, 1).unwrap();
    assert_eq!(report.cleared, 10);
    assert_eq!(release_sources(stacks.iter().flat_map(|p| p.leaves())), 0);

    // a reload has to go back to disk
    std::fs::remove_file(dir.join("histos").join("tt.json")).unwrap();
    let tt = stacks[0].expected.entries()[0].contributions()[0].key();
    assert!(!tt.is_loaded());
    let err = tt.load().unwrap_err();
    assert!(err.is_data_unavailable(), "unexpected error: {err}");
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn release_reports_open_sources() {
    let (dir, cfg) = fixture("release_stats", CONFIG);
    let samples = load_samples(&cfg, &dir, None).unwrap();
    let plot = PlotStacks::build(&cfg.plots["njets"], &samples, BindOptions::default()).unwrap();
    let stats = pit_stack::load_histograms(plot.leaves());
    assert_eq!(stats.loaded, 3);

    let cleared = plot.release();
    assert_eq!(cleared.cleared, 3);
    assert_eq!(cleared.sources, 3);
    assert_eq!(plot.release().sources, 0);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn strict_mode_rejects_missing_shapes() {
    let config = CONFIG.replace("root: histos", "root: histos\n  strict-shape-systematics: true");
    let (dir, cfg) = fixture("strict", &config);
    assert!(cfg.configuration.strict_shape_systematics);
    let samples = load_samples(&cfg, &dir, None).unwrap();
    let opts = BindOptions::from(&cfg.configuration);
    assert!(opts.strict_shapes);

    let mut renderer = |_: &PlotStacks| -> pit_core::Result<()> { Ok(()) };
    let err = make_stack_ratio_plots(&cfg.plot_list(), &samples, opts, &mut renderer, 10).unwrap_err();
    assert!(matches!(err, Error::ShapeVariationMissing { .. }), "unexpected error: {err}");
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn zero_chunk_size_is_rejected() {
    let mut renderer = |_: &PlotStacks| -> pit_core::Result<()> { Ok(()) };
    let err = make_stack_plots(&[], &mut renderer, 0).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}
