use std::cmp::Ordering;

pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }

    /// Smallest and largest value, ignoring NaNs.
    pub fn min_max(samples: &[f64]) -> Option<(f64, f64)> {
        samples
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Index of the first minimum, e.g. the earliest source of a flash.
    pub fn argmin<T: PartialOrd + Copy>(samples: &[T]) -> Option<usize> {
        let mut best: Option<(usize, T)> = None;
        for (idx, &value) in samples.iter().enumerate() {
            match best {
                Some((_, current)) if value.partial_cmp(&current) != Some(Ordering::Less) => {}
                _ => best = Some((idx, value)),
            }
        }
        best.map(|(idx, _)| idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_nothing_is_none() {
        assert_eq!(StatsHelper::mean(&[]), None);
        assert_eq!(StatsHelper::mean(&[2.0, 4.0]), Some(3.0));
    }

    #[test]
    fn min_max_skips_nan() {
        assert_eq!(StatsHelper::min_max(&[f64::NAN, 3.0, -1.0]), Some((-1.0, 3.0)));
        assert_eq!(StatsHelper::min_max(&[f64::NAN]), None);
    }

    #[test]
    fn argmin_prefers_first_tie() {
        assert_eq!(StatsHelper::argmin(&[5, 2, 2, 9]), Some(1));
        assert_eq!(StatsHelper::argmin::<i64>(&[]), None);
    }
}
