//! Short formatters producing CASA expressions: region masks and measures.

use std::fmt::{Display, Write};

use chrono::{DateTime, Utc};

use crate::statement::Statement;

/// Default aperture radius for [`circular_mask_string`].
pub const DEFAULT_APERTURE_RADIUS: &str = "1arcmin";

/// Region text for circular apertures about each centre.
///
/// Centres are written as given, so they may carry units
/// (`"12h30m00s"`, `"256pix"`). `None` gives an empty mask.
#[must_use]
pub fn circular_mask_string<X: Display, Y: Display>(
    centres: Option<&[(X, Y)]>,
    radius: &str,
) -> String {
    let mut mask = String::new();
    for (x, y) in centres.unwrap_or_default() {
        let _ = writeln!(mask, "circle [ [ {x} , {y}] , {radius} ]");
    }
    mask
}

/// Circular apertures in pixel coordinates.
#[must_use]
pub fn circular_pixel_mask_string(centres: Option<&[(f64, f64)]>, radius_pix: f64) -> String {
    let centres: Option<Vec<(String, String)>> = centres.map(|c| {
        c.iter()
            .map(|(x, y)| (format!("{x}pix"), format!("{y}pix")))
            .collect()
    });
    circular_mask_string(centres.as_deref(), &format!("{radius_pix}pix"))
}

/// Region text for square boxes of `width` pixels about each pixel centre.
#[must_use]
pub fn box_mask_string(centres: Option<&[(f64, f64)]>, width: f64) -> String {
    let half = width / 2.0;
    let mut mask = String::new();
    for (x, y) in centres.unwrap_or_default() {
        let _ = writeln!(
            mask,
            "box [ [{}pix , {}pix]  , [{}pix, {}pix] ]",
            x - half,
            y - half,
            x + half,
            y + half
        );
    }
    mask
}

/// A J2000 `me.direction` expression.
#[must_use]
pub fn casa_direction(ra_deg: f64, dec_deg: f64) -> Statement {
    Statement::call("me.direction")
        .arg("J2000")
        .arg(format!("{ra_deg}deg"))
        .arg(format!("{dec_deg}deg"))
}

/// A UTC `me.epoch` expression.
#[must_use]
pub fn casa_epoch(time: DateTime<Utc>) -> Statement {
    Statement::call("me.epoch")
        .arg("UTC")
        .arg(time.format("%Y/%m/%d/%H:%M:%S").to_string())
}
