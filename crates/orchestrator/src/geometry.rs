//! Body geometry: analytic circles and marker files

use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// Evenly spaced counter-clockwise markers on a circle
pub fn circle_markers(center: [f64; 2], radius: f64, points: usize) -> Vec<(f64, f64)> {
    (0..points)
        .map(|k| {
            let th = 2.0 * std::f64::consts::PI * k as f64 / points as f64;
            (center[0] + radius * th.cos(), center[1] + radius * th.sin())
        })
        .collect()
}

/// Load a marker file
///
/// The first non-empty line holds the marker count, each following line one
/// `x y` pair. Lines starting with `#` are ignored.
pub fn load_markers(path: &Path) -> Result<Vec<(f64, f64)>, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_markers(&contents, &path.display().to_string())
}

/// Parse marker-file text; `origin` names the source in errors
pub fn parse_markers(contents: &str, origin: &str) -> Result<Vec<(f64, f64)>, ConfigError> {
    let err = |line: usize, detail: String| ConfigError::Geometry {
        path: origin.to_string(),
        line,
        detail,
    };

    let mut lines = contents
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'));

    let (count_line, count) = lines.next().ok_or_else(|| err(1, "empty marker file".to_string()))?;
    let count: usize = count
        .parse()
        .map_err(|e| err(count_line, format!("invalid marker count {:?}: {}", count, e)))?;

    let mut markers = Vec::with_capacity(count);
    for (line, text) in lines {
        let mut fields = text.split_whitespace();
        let mut coord = |name: &str| -> Result<f64, ConfigError> {
            let field = fields.next().ok_or_else(|| err(line, format!("missing {} coordinate", name)))?;
            field
                .parse::<f64>()
                .map_err(|e| err(line, format!("invalid {} coordinate {:?}: {}", name, field, e)))
        };
        let x = coord("x")?;
        let y = coord("y")?;
        markers.push((x, y));
    }

    if markers.len() != count {
        return Err(err(
            count_line,
            format!("header announces {} markers, file has {}", count, markers.len()),
        ));
    }
    Ok(markers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circle_is_counter_clockwise() {
        let pts = circle_markers([1.0, 2.0], 0.5, 8);
        assert_eq!(pts.len(), 8);
        assert!((pts[0].0 - 1.5).abs() < 1e-12);
        // Second marker is above the first.
        assert!(pts[1].1 > pts[0].1);
    }

    #[test]
    fn parses_marker_text() {
        let text = "# square\n4\n0 0\n1 0\n1 1\n0 1\n";
        let pts = parse_markers(text, "square.txt").unwrap();
        assert_eq!(pts, vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
    }

    #[test]
    fn count_mismatch_is_reported() {
        let err = parse_markers("3\n0 0\n1 0\n", "tri.txt").unwrap_err();
        assert!(matches!(err, ConfigError::Geometry { line: 1, .. }), "{}", err);
    }

    #[test]
    fn bad_coordinate_names_the_line() {
        let err = parse_markers("2\n0 0\n1 oops\n", "bad.txt").unwrap_err();
        assert!(matches!(err, ConfigError::Geometry { line: 3, .. }), "{}", err);
    }
}
