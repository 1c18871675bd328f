//! Test data generators for synthetic wgrib inventories.
//!
//! A real NARR file holds hundreds of records; these generators produce
//! inventories with the same line layout and predictable record numbers.

/// Pressure levels (mb) used by [`narr_inventory`].
pub const TEST_LEVELS: [u32; 3] = [1000, 850, 500];

/// Variables present in a generated NARR file, including one that shares a
/// prefix with `HGT` so field matching is exercised.
pub const TEST_VARIABLES: [&str; 4] = ["HGT", "TMP", "SPFH", "HGTX"];

/// Record size used for offsets.
const RECORD_BYTES: u64 = 61344;

/// Creates a single wgrib inventory line.
///
/// # Example
///
/// ```
/// use test_utils::inventory_line;
///
/// let line = inventory_line(3, "15011500", "TMP", 850);
/// assert!(line.starts_with("3:122688:d=15011500:TMP:"));
/// assert!(line.contains(":kpds7=850:"));
/// ```
pub fn inventory_line(record: usize, stamp: &str, variable: &str, level: u32) -> String {
    let offset = (record as u64 - 1) * RECORD_BYTES;
    format!(
        "{record}:{offset}:d={stamp}:{variable}:kpds5={kpds5}:kpds6=100:kpds7={level}:TR=0:P1=0:P2=0:TimeU=1:{level} mb:anl:NAve=0",
        kpds5 = kpds5(variable),
    )
}

fn kpds5(variable: &str) -> u32 {
    match variable {
        "HGT" => 7,
        "TMP" => 11,
        "SPFH" => 51,
        _ => 255,
    }
}

/// Creates an inventory with every variable at every level.
///
/// Records are numbered from 1, variable-major, in the order given.
pub fn inventory(stamp: &str, variables: &[&str], levels: &[u32]) -> String {
    let mut lines = String::new();
    let mut record = 0;
    for variable in variables {
        for level in levels {
            record += 1;
            lines.push_str(&inventory_line(record, stamp, variable, *level));
            lines.push('\n');
        }
    }
    lines
}

/// Creates the inventory of a full synthetic NARR file.
pub fn narr_inventory(stamp: &str) -> String {
    inventory(stamp, &TEST_VARIABLES, &TEST_LEVELS)
}
