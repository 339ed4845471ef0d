//! Textual feature-file parser: one whitespace-delimited record per line,
//! `phase cx cy cz axisA axisB axisC omega3 phi1 Phi phi2`, preceded by a
//! record count. Loader for the "load mode" alternative to generation +
//! placement, built with `nom`'s combinator style.

use nom::character::complete::{multispace0, multispace1};
use nom::combinator::map_res;
use nom::multi::count;
use nom::number::complete::recognize_float;
use nom::sequence::preceded;
use nom::IResult;

use crate::error::{PackingError, Result};
use crate::feature::{Feature, Footprint};
use crate::orientation::EulerAngles;
use crate::phase::ShapeClass;

/// One parsed record from a feature file, before it's converted into a
/// [`Feature`] (volume/equivalent-diameter/axis-length derivation needs
/// the caller's shape-class context).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeatureRecord {
    pub phase: u32,
    pub centroid: [f64; 3],
    pub semi_axes: [f64; 3],
    pub omega3: f64,
    pub euler: EulerAngles,
}

fn parse_u32(input: &str) -> IResult<&str, u32> {
    map_res(recognize_float, |s: &str| s.parse::<f64>().map(|v| v as u32))(input)
}

fn parse_f64(input: &str) -> IResult<&str, f64> {
    map_res(recognize_float, |s: &str| s.parse::<f64>())(input)
}

fn parse_record(input: &str) -> IResult<&str, FeatureRecord> {
    let (input, phase) = preceded(multispace0, parse_u32)(input)?;
    let (input, cx) = preceded(multispace1, parse_f64)(input)?;
    let (input, cy) = preceded(multispace1, parse_f64)(input)?;
    let (input, cz) = preceded(multispace1, parse_f64)(input)?;
    let (input, a) = preceded(multispace1, parse_f64)(input)?;
    let (input, b) = preceded(multispace1, parse_f64)(input)?;
    let (input, c) = preceded(multispace1, parse_f64)(input)?;
    let (input, omega3) = preceded(multispace1, parse_f64)(input)?;
    let (input, phi1) = preceded(multispace1, parse_f64)(input)?;
    let (input, phi_cap) = preceded(multispace1, parse_f64)(input)?;
    let (input, phi2) = preceded(multispace1, parse_f64)(input)?;

    Ok((
        input,
        FeatureRecord {
            phase,
            centroid: [cx, cy, cz],
            semi_axes: [a, b, c],
            omega3,
            euler: EulerAngles::new(phi1, phi_cap, phi2),
        },
    ))
}

/// Parses the whole feature-file text: a leading record count followed
/// by that many whitespace-separated records.
pub fn parse_feature_file(input: &str) -> Result<Vec<FeatureRecord>> {
    let (rest, num_features) = preceded(multispace0, parse_u32)(input)
        .map_err(|e| PackingError::IoFailure(format!("failed to read feature count: {e}")))?;
    if num_features == 0 {
        return Err(PackingError::InvalidInput(
            "feature file declares zero features".to_string(),
        ));
    }
    let (_rest, records) = count(parse_record, num_features as usize)(rest)
        .map_err(|e| PackingError::IoFailure(format!("failed to parse feature records: {e}")))?;
    Ok(records)
}

/// Converts a parsed record into a [`Feature`], deriving volume and
/// equivalent diameter from the raw semi-axes the way `loadFeatures`
/// does (`vol = 4/3 pi a b c`), with no footprint yet assigned.
pub fn record_to_feature(id: i32, record: &FeatureRecord, shape_class: ShapeClass) -> Feature {
    let [a, b, c] = record.semi_axes;
    let volume = 4.0 / 3.0 * std::f64::consts::PI * a * b * c;
    let equivalent_diameter = 2.0 * (volume * 0.75 / std::f64::consts::PI).cbrt();

    Feature {
        id,
        phase: record.phase,
        shape_class,
        volume,
        equivalent_diameter,
        axis_lengths: [1.0, b / a, c / a],
        axis_euler: record.euler,
        omega3: record.omega3,
        centroid: record.centroid,
        footprint: Footprint::default(),
        neighborhood_count: 0,
        pack_quality: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "2\n1 1.0 2.0 3.0 4.0 3.0 2.0 0.3 0.1 0.2 0.3\n1 5.0 6.0 7.0 2.0 2.0 2.0 0.0 0.0 0.0 0.0\n";

    #[test]
    fn parses_declared_record_count() {
        let records = parse_feature_file(SAMPLE).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn first_record_fields_round_trip() {
        let records = parse_feature_file(SAMPLE).unwrap();
        assert_eq!(records[0].phase, 1);
        assert_eq!(records[0].centroid, [1.0, 2.0, 3.0]);
        assert_eq!(records[0].semi_axes, [4.0, 3.0, 2.0]);
    }

    #[test]
    fn zero_declared_features_is_an_error() {
        assert!(parse_feature_file("0\n").is_err());
    }

    #[test]
    fn record_to_feature_normalises_axis_lengths() {
        let records = parse_feature_file(SAMPLE).unwrap();
        let feature = record_to_feature(1, &records[1], ShapeClass::Ellipsoid);
        assert_eq!(feature.axis_lengths, [1.0, 1.0, 1.0]);
        assert!(feature.volume > 0.0);
    }
}
