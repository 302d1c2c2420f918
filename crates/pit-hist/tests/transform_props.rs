//! Property tests: transforms conserve the total content and variance.

use approx::assert_relative_eq;
use pit_hist::Distribution;
use proptest::prelude::*;

fn build(cells: Vec<f64>) -> Distribution {
    let n = cells.len() - 2;
    let variance = cells.iter().map(|c| c.abs()).collect();
    Distribution::new("h", pit_hist::uniform_edges(n, 0.0, n as f64), cells, variance).unwrap()
}

proptest! {
    #[test]
    fn rebin_conserves_totals(cells in proptest::collection::vec(0.0f64..1e3, 3..40), k in 1usize..6) {
        let d = build(cells);
        prop_assume!(k <= d.n_bins());
        let r = d.rebinned(k).unwrap();
        prop_assert_eq!(r.n_bins(), d.n_bins() / k);
        assert_relative_eq!(r.contents().iter().sum::<f64>(), d.contents().iter().sum::<f64>(), max_relative = 1e-12);
        assert_relative_eq!(r.variance().iter().sum::<f64>(), d.variance().iter().sum::<f64>(), max_relative = 1e-12);
    }

    #[test]
    fn fold_conserves_totals_and_empties_outside(
        cells in proptest::collection::vec(0.0f64..1e3, 3..40),
        a in 0usize..40,
        b in 0usize..40,
    ) {
        let d = build(cells);
        let n = d.n_bins();
        let (first, last) = (1 + a.min(b) % n, 1 + a.max(b) % n);
        prop_assume!(first <= last);
        let f = d.folded(first, last).unwrap();
        assert_relative_eq!(f.contents().iter().sum::<f64>(), d.contents().iter().sum::<f64>(), max_relative = 1e-12);
        assert_relative_eq!(f.variance().iter().sum::<f64>(), d.variance().iter().sum::<f64>(), max_relative = 1e-12);
        for i in (0..first).chain(last + 1..n + 2) {
            prop_assert_eq!(f.contents()[i], 0.0);
            prop_assert_eq!(f.variance()[i], 0.0);
        }
    }

    #[test]
    fn rebin_by_one_keeps_everything(cells in proptest::collection::vec(-1e3f64..1e3, 3..20)) {
        let d = build(cells);
        prop_assert_eq!(d.rebinned(1).unwrap(), d);
    }
}
