//! Common test fixtures for NARR archive tests.
//!
//! This module builds documents in the shapes the remote archive and the
//! scene metadata actually take.

/// Listing modification time used by the end-to-end scenario.
pub const SAMPLE_REMOTE_MTIME: &str = "10-Jan-2015 08:00";

/// Remote filename of the 2015-01-15 00Z analysis.
pub const SAMPLE_REMOTE_NAME: &str = "rcdas.2015011500.awip32.merged";

/// Builds an Apache-style directory listing.
///
/// Each row is `(name, last modified, size)`. A parent-directory row with
/// no modification time is always included first.
///
/// # Example
///
/// ```
/// use test_utils::listing_html;
///
/// let html = listing_html(&[("rcdas.2015011500.awip32.merged", "10-Jan-2015 08:00", "54M")]);
/// assert!(html.contains("10-Jan-2015 08:00"));
/// ```
pub fn listing_html(rows: &[(&str, &str, &str)]) -> String {
    let mut html = String::from(
        r#"<!DOCTYPE HTML PUBLIC "-//W3C//DTD HTML 3.2 Final//EN">
<html>
 <head>
  <title>Index of /wd51we/NARR_archive</title>
 </head>
 <body>
<h1>Index of /wd51we/NARR_archive</h1>
  <table>
   <tr><th valign="top">&nbsp;</th><th><a href="?C=N;O=D">Name</a></th><th><a href="?C=M;O=A">Last modified</a></th><th><a href="?C=S;O=A">Size</a></th></tr>
   <tr><th colspan="4"><hr></th></tr>
<tr><td valign="top">&nbsp;</td><td><a href="/wd51we/">Parent Directory</a></td><td>&nbsp;</td><td align="right">  - </td></tr>
"#,
    );
    for (name, modified, size) in rows {
        html.push_str(&format!(
            "<tr><td valign=\"top\">&nbsp;</td><td><a href=\"{name}\">{name}</a></td><td align=\"right\">{modified}  </td><td align=\"right\">{size}</td></tr>\n"
        ));
    }
    html.push_str("   <tr><th colspan=\"4\"><hr></th></tr>\n</table>\n</body></html>\n");
    html
}

/// Builds an ESPA metadata document for a scene.
///
/// # Arguments
///
/// * `acquisition_date` - `YYYY-MM-DD`
/// * `scene_center_time` - e.g. `17:04:12.1234567Z`
pub fn espa_metadata_xml(acquisition_date: &str, scene_center_time: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<espa_metadata version="2.0" xmlns="http://espa.cr.usgs.gov/v2" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
    <global_metadata>
        <data_provider>USGS/EROS</data_provider>
        <satellite>LANDSAT_8</satellite>
        <instrument>OLI/TIRS_1T</instrument>
        <acquisition_date>{acquisition_date}</acquisition_date>
        <scene_center_time>{scene_center_time}</scene_center_time>
        <level1_production_date>2015-01-20T14:22:11.000000Z</level1_production_date>
    </global_metadata>
    <bands>
        <band product="L1T" source="level1" name="b10" category="image" data_type="UINT16">
            <file_name>LC80410272015015LGN00_B10.TIF</file_name>
        </band>
    </bands>
</espa_metadata>
"#
    )
}
