//! Cohesion formulas over [`ClassStructure`].
//!
//! Every formula guards its degenerate shapes (no methods, one method, no
//! fields) explicitly so that no division by zero reaches the aggregate.

use std::collections::HashSet;

use super::structure::ClassStructure;

/// Loose and Strict Class Cohesion.
pub fn lscc(s: &ClassStructure) -> f64 {
    let (l, k) = (s.l(), s.k());
    match (l, k) {
        (0, 0) => 1.0,
        (0, _) if k > 1 => 0.0,
        (_, 0) | (_, 1) => 1.0,
        _ => {
            let x: usize = (0..k).map(|i| s.usage(i).len()).sum();
            x as f64 / (l * k * (k - 1)) as f64
        }
    }
}

pub fn lscc_weight(s: &ClassStructure) -> f64 {
    let (l, k) = (s.l(), s.k());
    if k == 1 {
        return 1.0;
    }
    (l * k * k.saturating_sub(1)) as f64
}

/// Tight Class Cohesion: share of method pairs with a common field.
pub fn tcc(s: &ClassStructure) -> f64 {
    let k = s.k();
    if k < 2 {
        return 0.0;
    }
    let connected = pairs(k)
        .filter(|&(i, j)| shares_field(s.usage(i), s.usage(j)))
        .count();
    connected as f64 / (k * (k - 1) / 2) as f64
}

/// Class Cohesion: mean Jaccard similarity of method field sets.
pub fn cc(s: &ClassStructure) -> f64 {
    let k = s.k();
    if k < 2 {
        return 0.0;
    }
    let sigma: f64 = pairs(k)
        .map(|(i, j)| {
            let (inter, union) = overlap(s.usage(i), s.usage(j));
            if union == 0 {
                0.0
            } else {
                inter as f64 / union as f64
            }
        })
        .sum();
    2.0 * sigma / (k * (k - 1)) as f64
}

/// Sensitive Class Cohesion Metric.
pub fn scom(s: &ClassStructure) -> f64 {
    let (l, k) = (s.l(), s.k());
    if l == 0 || k < 2 {
        return 0.0;
    }
    let sigma: f64 = pairs(k)
        .map(|(i, j)| {
            let (a, b) = (s.usage(i), s.usage(j));
            if a.is_empty() || b.is_empty() {
                return 0.0;
            }
            let (inter, union) = overlap(a, b);
            (inter * union) as f64 / a.len().min(b.len()) as f64
        })
        .sum();
    2.0 * sigma / (l * k * (k - 1)) as f64
}

/// Henderson-Sellers lack of cohesion.
pub fn lcom5(s: &ClassStructure) -> f64 {
    let (l, k) = (s.l(), s.k());
    if l == 0 || k < 2 {
        return 0.0;
    }
    let references: usize = s.fields.iter().map(|a| s.methods_referencing(a)).sum();
    (k as f64 - references as f64 / l as f64) / (k - 1) as f64
}

/// `k·(k-1)`, shared by TCC and CC.
pub fn pair_weight(s: &ClassStructure) -> f64 {
    let k = s.k();
    (k * k.saturating_sub(1)) as f64
}

pub fn scom_weight(s: &ClassStructure) -> f64 {
    s.l() as f64 * pair_weight(s)
}

pub fn lcom5_weight(s: &ClassStructure) -> f64 {
    (s.l() * s.k()) as f64
}

fn pairs(k: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..k).flat_map(move |i| (i + 1..k).map(move |j| (i, j)))
}

fn shares_field(a: &[String], b: &[String]) -> bool {
    a.iter().any(|f| b.contains(f))
}

fn overlap(a: &[String], b: &[String]) -> (usize, usize) {
    let a: HashSet<&String> = a.iter().collect();
    let b: HashSet<&String> = b.iter().collect();
    (a.intersection(&b).count(), a.union(&b).count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::structure::MethodUsage;

    fn class(fields: &[&str], methods: &[&[&str]]) -> ClassStructure {
        ClassStructure {
            name: "C".into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            methods: methods
                .iter()
                .enumerate()
                .map(|(i, used)| MethodUsage {
                    name: format!("m{i}"),
                    fields: used.iter().map(|f| f.to_string()).collect(),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_lscc_boundaries() {
        assert_eq!(lscc(&class(&[], &[])), 1.0);
        assert_eq!(lscc(&class(&["a"], &[])), 1.0);
        assert_eq!(lscc(&class(&["a"], &[&["a"]])), 1.0);
        assert_eq!(lscc(&class(&[], &[&[], &[]])), 0.0);
        assert_eq!(lscc_weight(&class(&["a"], &[&["a"]])), 1.0);
        assert_eq!(lscc_weight(&class(&[], &[])), 0.0);
    }

    #[test]
    fn test_lscc_value() {
        // x = 2 + 1, l = 2, k = 2
        let s = class(&["a", "b"], &[&["a", "b"], &["a"]]);
        assert!((lscc(&s) - 3.0 / 4.0).abs() < 1e-12);
        assert_eq!(lscc_weight(&s), 4.0);
    }

    #[test]
    fn test_pair_metrics_zero_below_two_methods() {
        for s in [class(&[], &[]), class(&["a"], &[&["a"]])] {
            assert_eq!(tcc(&s), 0.0);
            assert_eq!(cc(&s), 0.0);
            assert_eq!(scom(&s), 0.0);
            assert_eq!(lcom5(&s), 0.0);
        }
    }

    #[test]
    fn test_tcc_and_cc() {
        let s = class(&["a", "b", "c"], &[&["a", "b"], &["b"], &["c"]]);
        // only (m0, m1) share a field
        assert!((tcc(&s) - 1.0 / 3.0).abs() < 1e-12);
        // jaccard(m0, m1) = 1/2, others 0
        assert!((cc(&s) - 2.0 * 0.5 / 6.0).abs() < 1e-12);
        assert_eq!(pair_weight(&s), 6.0);
    }

    #[test]
    fn test_cc_empty_union_pairs_contribute_zero() {
        let s = class(&["a"], &[&[], &[]]);
        assert_eq!(cc(&s), 0.0);
    }

    #[test]
    fn test_scom() {
        let s = class(&["a", "b"], &[&["a", "b"], &["a"], &[]]);
        // pair (m0, m1): |∩|=1, |∪|=2, min=1 -> 2; pairs with m2 contribute 0
        let expected = 2.0 * 2.0 / (2.0 * 3.0 * 2.0);
        assert!((scom(&s) - expected).abs() < 1e-12);
        assert_eq!(scom_weight(&s), 12.0);
    }

    #[test]
    fn test_lcom5() {
        // every method touches every field: perfectly cohesive
        let s = class(&["a", "b"], &[&["a", "b"], &["a", "b"]]);
        assert_eq!(lcom5(&s), 0.0);
        // each field used by one method
        let s = class(&["a", "b"], &[&["a"], &["b"]]);
        assert!((lcom5(&s) - 1.0).abs() < 1e-12);
        assert_eq!(lcom5_weight(&s), 4.0);
    }
}
