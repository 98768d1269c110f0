//! Matrix Profile Engine
//!
//! Z-normalized Euclidean matrix profiles for subsequence similarity search.
//!
//! - Self-join: for every subsequence of a series, the distance to its nearest
//!   non-trivial neighbor (STOMP-style diagonal traversal, O(n²)).
//! - AB-join: for every subsequence of A, the distance to its nearest
//!   subsequence in B.
//!
//! Subsequences containing a missing value have infinite distance and are
//! never reported as a neighbor.

/// Below this standard deviation a subsequence is treated as constant
const STDDEV_THRESHOLD: f64 = 1e-7;

/// Nearest-neighbor distances indexed by subsequence start
#[derive(Debug, Clone)]
pub struct MatrixProfile {
    pub profile: Vec<f64>,
    pub profile_index: Vec<Option<usize>>,
    pub subsequence_length: usize,
    pub exclusion_zone: usize,
}

impl MatrixProfile {
    pub fn len(&self) -> usize {
        self.profile.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profile.is_empty()
    }
}

/// Mean, standard deviation and validity of every subsequence of length `m`
struct SubsequenceStats {
    mean: Vec<f64>,
    std: Vec<f64>,
    valid: Vec<bool>,
}

impl SubsequenceStats {
    fn compute(values: &[f64], present: &[bool], m: usize) -> Self {
        let count = values.len() + 1 - m;
        let mut mean = Vec::with_capacity(count);
        let mut std = Vec::with_capacity(count);
        let mut valid = Vec::with_capacity(count);

        for i in 0..count {
            let window = &values[i..i + m];
            let mu = window.iter().sum::<f64>() / m as f64;
            let var = window.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / m as f64;
            mean.push(mu);
            std.push(var.sqrt());
            valid.push(present[i..i + m].iter().all(|p| *p));
        }

        Self { mean, std, valid }
    }

    fn distance(&self, i: usize, other: &Self, j: usize, qt: f64, m: usize) -> f64 {
        let m_f = m as f64;
        let const_a = self.std[i] < STDDEV_THRESHOLD;
        let const_b = other.std[j] < STDDEV_THRESHOLD;
        match (const_a, const_b) {
            (true, true) => 0.0,
            (true, false) | (false, true) => m_f.sqrt(),
            (false, false) => {
                let corr = (qt - m_f * self.mean[i] * other.mean[j])
                    / (m_f * self.std[i] * other.std[j]);
                (2.0 * m_f * (1.0 - corr)).max(0.0).sqrt()
            }
        }
    }
}

/// Split an optional series into zero-filled values and a presence mask
fn densify(series: &[Option<f64>]) -> (Vec<f64>, Vec<bool>) {
    series
        .iter()
        .map(|v| match v {
            Some(x) if x.is_finite() => (*x, true),
            _ => (0.0, false),
        })
        .unzip()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Self-join matrix profile with an exclusion zone of `ceil(m / 4)`.
///
/// Returns `None` when the series is shorter than `m` or `m` is zero.
pub fn self_join(series: &[Option<f64>], m: usize) -> Option<MatrixProfile> {
    if m == 0 || series.len() < m {
        return None;
    }

    let (values, present) = densify(series);
    let stats = SubsequenceStats::compute(&values, &present, m);
    let count = stats.mean.len();
    let exclusion_zone = m.div_ceil(4);

    let mut profile = vec![f64::INFINITY; count];
    let mut profile_index = vec![None; count];

    // Diagonal k pairs subsequence i with i + k; qt is updated incrementally along it
    for k in (exclusion_zone + 1)..count {
        let mut qt = dot(&values[0..m], &values[k..k + m]);
        for i in 0..(count - k) {
            let j = i + k;
            if i > 0 {
                qt = qt - values[i - 1] * values[j - 1] + values[i + m - 1] * values[j + m - 1];
            }
            if !stats.valid[i] || !stats.valid[j] {
                continue;
            }

            let d = stats.distance(i, &stats, j, qt, m);
            if d < profile[i] {
                profile[i] = d;
                profile_index[i] = Some(j);
            }
            if d < profile[j] {
                profile[j] = d;
                profile_index[j] = Some(i);
            }
        }
    }

    Some(MatrixProfile {
        profile,
        profile_index,
        subsequence_length: m,
        exclusion_zone,
    })
}

/// AB-join: distance from every subsequence of `a` to its nearest subsequence of `b`.
///
/// Returns `None` when either series is shorter than `m` or `m` is zero.
pub fn ab_join(a: &[Option<f64>], b: &[Option<f64>], m: usize) -> Option<Vec<f64>> {
    if m == 0 || a.len() < m || b.len() < m {
        return None;
    }

    let (a_values, a_present) = densify(a);
    let (b_values, b_present) = densify(b);
    let a_stats = SubsequenceStats::compute(&a_values, &a_present, m);
    let b_stats = SubsequenceStats::compute(&b_values, &b_present, m);

    let distances = (0..a_stats.mean.len())
        .map(|i| {
            if !a_stats.valid[i] {
                return f64::INFINITY;
            }
            (0..b_stats.mean.len())
                .filter(|&j| b_stats.valid[j])
                .map(|j| {
                    let qt = dot(&a_values[i..i + m], &b_values[j..j + m]);
                    a_stats.distance(i, &b_stats, j, qt, m)
                })
                .fold(f64::INFINITY, f64::min)
        })
        .collect();

    Some(distances)
}

/// Sum of the finite entries of a profile
pub fn finite_sum(profile: &[f64]) -> f64 {
    profile.iter().filter(|d| d.is_finite()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    fn znorm(x: &[f64]) -> Vec<f64> {
        let mu = x.iter().sum::<f64>() / x.len() as f64;
        let sd = (x.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / x.len() as f64).sqrt();
        x.iter().map(|v| (v - mu) / sd).collect()
    }

    fn brute_distance(a: &[f64], b: &[f64]) -> f64 {
        znorm(a)
            .iter()
            .zip(znorm(b))
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    #[test]
    fn test_self_join_matches_brute_force() {
        let values: Vec<f64> = (0..60).map(|i| ((i * 7919) % 101) as f64).collect();
        let m = 8;
        let mp = self_join(&some(&values), m).unwrap();
        assert_eq!(mp.len(), 60 - m + 1);
        assert_eq!(mp.exclusion_zone, 2);

        for i in 0..mp.len() {
            let expected = (0..mp.len())
                .filter(|&j| i.abs_diff(j) > mp.exclusion_zone)
                .map(|j| brute_distance(&values[i..i + m], &values[j..j + m]))
                .fold(f64::INFINITY, f64::min);
            assert!(
                (mp.profile[i] - expected).abs() < 1e-6,
                "index {}: {} vs {}",
                i,
                mp.profile[i],
                expected
            );
            let nn = mp.profile_index[i].unwrap();
            assert!(i.abs_diff(nn) > mp.exclusion_zone);
        }
    }

    #[test]
    fn test_periodic_signal_has_near_zero_profile() {
        let values: Vec<f64> = (0..200)
            .map(|i| (i as f64 * std::f64::consts::TAU / 20.0).sin())
            .collect();
        let mp = self_join(&some(&values), 20).unwrap();
        assert!(mp.profile.iter().all(|d| *d < 1e-3));
    }

    #[test]
    fn test_planted_discord_has_largest_distance() {
        let mut values: Vec<f64> = (0..300)
            .map(|i| (i as f64 * std::f64::consts::TAU / 25.0).sin())
            .collect();
        for (k, v) in values[150..160].iter_mut().enumerate() {
            *v += if k % 2 == 0 { 2.0 } else { -2.0 };
        }
        let mp = self_join(&some(&values), 25).unwrap();
        let (argmax, _) = mp
            .profile
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |best, (i, d)| if *d > best.1 { (i, *d) } else { best });
        assert!((126..160).contains(&argmax), "discord at {}", argmax);
    }

    #[test]
    fn test_missing_values_make_distance_infinite() {
        let mut series = some(&(0..40).map(|i| (i % 7) as f64).collect::<Vec<_>>());
        series[10] = None;
        let mp = self_join(&series, 5).unwrap();
        for i in 6..=10 {
            assert!(mp.profile[i].is_infinite());
            assert!(mp.profile_index[i].is_none());
        }
        assert!(mp.profile[0].is_finite());
        assert!(mp.profile_index.iter().flatten().all(|&j| !(6..=10).contains(&j)));
    }

    #[test]
    fn test_constant_subsequences() {
        let series = some(&[1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        let mp = self_join(&series, 3).unwrap();
        assert!(mp.profile.iter().all(|d| *d == 0.0));

        let d = ab_join(&some(&[2.0, 2.0, 2.0]), &some(&[1.0, 2.0, 3.0]), 3).unwrap();
        assert!((d[0] - 3f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_ab_join_identical_series() {
        let values: Vec<f64> = (0..12).map(|i| ((i * 5) % 9) as f64).collect();
        let d = ab_join(&some(&values), &some(&values), 3).unwrap();
        assert_eq!(d.len(), 10);
        assert!(d.iter().all(|x| *x < 1e-6));
        assert!(finite_sum(&d) < 1e-5);
    }

    #[test]
    fn test_short_series() {
        assert!(self_join(&some(&[1.0, 2.0]), 3).is_none());
        assert!(ab_join(&some(&[1.0, 2.0, 3.0]), &some(&[1.0]), 3).is_none());
        assert!(self_join(&some(&[1.0, 2.0]), 0).is_none());
    }
}
