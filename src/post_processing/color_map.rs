use nalgebra::Vector3;

use crate::error::{RenderError, RenderResult};

pub type Color = Vector3<f64>;

/// Color used for particles whose scalar value is NaN.
pub const NAN_COLOR: [f64; 3] = [0.5, 0.5, 0.5];

/// Piecewise linear map from scalar values to colors. Values outside the
/// stop range are clamped to the first/last color.
#[derive(Debug, Clone)]
pub struct ColorMap {
    insertions: Vec<(f64, Color)>,
}

impl ColorMap {
    /// Panics if `insertions` is empty.
    pub fn new(mut insertions: Vec<(f64, Color)>) -> Self {
        assert!(!insertions.is_empty(), "color map needs at least one stop");
        insertions.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { insertions }
    }

    /// Spreads evenly spaced `table` entries over `[min, max]`.
    fn from_table(table: &[[f64; 3]], min: f64, max: f64) -> Self {
        let last = (table.len() - 1).max(1) as f64;
        Self::new(
            table
                .iter()
                .enumerate()
                .map(|(i, c)| (min + (max - min) * (i as f64 / last), Color::new(c[0], c[1], c[2])))
                .collect(),
        )
    }

    /// Looks up a map by its matplotlib-style name. A trailing `_r`
    /// reverses the map.
    pub fn named(name: &str, min: f64, max: f64) -> RenderResult<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let (base, reversed) = match lower.strip_suffix("_r") {
            Some(base) => (base, true),
            None => (lower.as_str(), false),
        };

        let table: &[[f64; 3]] = match base {
            "viridis" => &VIRIDIS,
            "inferno" => &INFERNO,
            "plasma" => &PLASMA,
            "coolwarm" => &COOLWARM,
            "blackbody" | "black_body" => &BLACK_BODY,
            "jet" => return Ok(Self::jet(min, max, reversed)),
            _ => return Err(RenderError::UnknownColormap(name.to_string())),
        };

        if reversed {
            let rev: Vec<[f64; 3]> = table.iter().rev().cloned().collect();
            Ok(Self::from_table(&rev, min, max))
        } else {
            Ok(Self::from_table(table, min, max))
        }
    }

    fn jet(min: f64, max: f64, reversed: bool) -> Self {
        let stops = [
            (0.0, [0.0, 0.0, 0.5]),
            (0.11, [0.0, 0.0, 1.0]),
            (0.125, [0.0, 0.0, 1.0]),
            (0.375, [0.0, 1.0, 1.0]),
            (0.625, [1.0, 1.0, 0.0]),
            (0.875, [1.0, 0.0, 0.0]),
            (1.0, [0.5, 0.0, 0.0]),
        ];
        Self::new(
            stops
                .iter()
                .map(|&(t, c)| {
                    let t = if reversed { 1.0 - t } else { t };
                    (min + (max - min) * t, Color::new(c[0], c[1], c[2]))
                })
                .collect(),
        )
    }

    pub fn get(&self, x: f64) -> Color {
        if x.is_nan() {
            return Color::new(NAN_COLOR[0], NAN_COLOR[1], NAN_COLOR[2]);
        }

        let first = self.insertions[0];
        let last = self.insertions[self.insertions.len() - 1];
        if x <= first.0 {
            return first.1;
        }
        if x >= last.0 {
            return last.1;
        }

        for pair in self.insertions.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if x >= a.0 && x <= b.0 {
                let span = b.0 - a.0;
                if span <= 0. {
                    return b.1;
                }
                let interp = (x - a.0) / span;
                return a.1 + interp * (b.1 - a.1);
            }
        }

        last.1
    }

    pub fn color_stops(&self) -> &[(f64, Color)] {
        &self.insertions
    }

    pub fn min_value(&self) -> f64 {
        self.insertions[0].0
    }

    pub fn max_value(&self) -> f64 {
        self.insertions[self.insertions.len() - 1].0
    }
}

const VIRIDIS: [[f64; 3]; 16] = [
    [0.2670, 0.0049, 0.3294],
    [0.2827, 0.1002, 0.4222],
    [0.2771, 0.1852, 0.4899],
    [0.2539, 0.2653, 0.5300],
    [0.2220, 0.3392, 0.5488],
    [0.1906, 0.4071, 0.5561],
    [0.1636, 0.4711, 0.5581],
    [0.1391, 0.5338, 0.5553],
    [0.1206, 0.5964, 0.5436],
    [0.1347, 0.6586, 0.5176],
    [0.2080, 0.7187, 0.4729],
    [0.3278, 0.7740, 0.4066],
    [0.4775, 0.8214, 0.3182],
    [0.6473, 0.8584, 0.2099],
    [0.8249, 0.8847, 0.1062],
    [0.9932, 0.9062, 0.1439],
];

const INFERNO: [[f64; 3]; 16] = [
    [0.0015, 0.0005, 0.0139],
    [0.0469, 0.0303, 0.1502],
    [0.1424, 0.0462, 0.3086],
    [0.2582, 0.0386, 0.4065],
    [0.3665, 0.0716, 0.4320],
    [0.4723, 0.1105, 0.4283],
    [0.5783, 0.1480, 0.4044],
    [0.6827, 0.1895, 0.3608],
    [0.7805, 0.2433, 0.2995],
    [0.8650, 0.3168, 0.2261],
    [0.9296, 0.4115, 0.1454],
    [0.9709, 0.5229, 0.0584],
    [0.9876, 0.6453, 0.0399],
    [0.9788, 0.7745, 0.1760],
    [0.9500, 0.9034, 0.3803],
    [0.9884, 0.9984, 0.6449],
];

const PLASMA: [[f64; 3]; 9] = [
    [0.0504, 0.0298, 0.5280],
    [0.2845, 0.0122, 0.6314],
    [0.4949, 0.0120, 0.6579],
    [0.6748, 0.1313, 0.5763],
    [0.7982, 0.2802, 0.4695],
    [0.9003, 0.4322, 0.3545],
    [0.9734, 0.5858, 0.2515],
    [0.9883, 0.7785, 0.1570],
    [0.9400, 0.9752, 0.1313],
];

const COOLWARM: [[f64; 3]; 16] = [
    [0.2300, 0.2990, 0.7540],
    [0.3093, 0.4138, 0.8506],
    [0.3943, 0.5228, 0.9256],
    [0.4841, 0.6225, 0.9756],
    [0.5764, 0.7093, 0.9986],
    [0.6676, 0.7797, 0.9936],
    [0.7539, 0.8306, 0.9613],
    [0.8313, 0.8597, 0.9032],
    [0.8998, 0.8477, 0.8178],
    [0.9479, 0.7951, 0.7171],
    [0.9690, 0.7214, 0.6124],
    [0.9636, 0.6288, 0.5076],
    [0.9327, 0.5196, 0.4063],
    [0.8779, 0.3952, 0.3115],
    [0.8014, 0.2515, 0.2254],
    [0.7060, 0.0160, 0.1500],
];

const BLACK_BODY: [[f64; 3]; 16] = [
    [0.0000, 0.0000, 0.0000],
    [0.1394, 0.0601, 0.0358],
    [0.2414, 0.0856, 0.0658],
    [0.3519, 0.1048, 0.0848],
    [0.4682, 0.1194, 0.1017],
    [0.5893, 0.1292, 0.1186],
    [0.7068, 0.1500, 0.1314],
    [0.7732, 0.2550, 0.1117],
    [0.8394, 0.3455, 0.0761],
    [0.8938, 0.4399, 0.0279],
    [0.9060, 0.5543, 0.0707],
    [0.9125, 0.6621, 0.1123],
    [0.9126, 0.7667, 0.1534],
    [0.9057, 0.8697, 0.1947],
    [0.9633, 0.9403, 0.5654],
    [1.0000, 1.0000, 1.0000],
];

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Color, b: [f64; 3]) -> bool {
        (a - Color::new(b[0], b[1], b[2])).norm() < 1e-9
    }

    #[test]
    fn clamps_outside_range() {
        let map = ColorMap::named("viridis", 0., 1.).unwrap();
        assert!(close(map.get(-5.), VIRIDIS[0]));
        assert!(close(map.get(5.), VIRIDIS[15]));
    }

    #[test]
    fn interpolates_between_stops() {
        let map = ColorMap::new(vec![(0., Color::new(0., 0., 0.)), (2., Color::new(1., 0.5, 0.))]);
        assert!(close(map.get(1.), [0.5, 0.25, 0.]));
    }

    #[test]
    fn reversed_map() {
        let map = ColorMap::named("inferno_r", 10., 20.).unwrap();
        assert!(close(map.get(10.), INFERNO[15]));
        assert!(close(map.get(20.), INFERNO[0]));
        assert_eq!(map.min_value(), 10.);
        assert_eq!(map.max_value(), 20.);
    }

    #[test]
    fn names_are_case_insensitive_and_unknown_fails() {
        assert!(ColorMap::named("Jet", 0., 1.).is_ok());
        assert!(ColorMap::named("coolwarm", 0., 1.).is_ok());
        assert!(matches!(
            ColorMap::named("rainbow-unicorn", 0., 1.),
            Err(RenderError::UnknownColormap(_))
        ));
    }

    #[test]
    fn nan_and_degenerate_range() {
        let map = ColorMap::named("plasma", 3., 3.).unwrap();
        assert!(close(map.get(f64::NAN), NAN_COLOR));
        assert!(close(map.get(3.), PLASMA[0]));
    }
}
