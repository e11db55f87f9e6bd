
use crate::balance::OptimizeResult;
use crate::offerings::Offerings;
use crate::{ClassGroup, Config, Snapshot, Student};
use serde_json::json;

/// Read a problem snapshot from the simple JSON representation (canonical serde_json
/// serialization of `Student` and `ClassGroup` objects plus an optional `config` section).
///
/// Object indexes are assigned from the list positions, academic scores are clamped to their
/// valid range and the offerings view is derived from the classes' quota tables.
pub fn read<R: std::io::Read>(reader: R) -> Result<(Snapshot, Config), String> {
    let mut data: serde_json::Value =
        serde_json::from_reader(reader).map_err(|err| err.to_string())?;

    let mut students: Vec<Student> =
        serde_json::from_value(data["students"].take()).map_err(|e| format!("{}", e))?;
    for (i, s) in students.iter_mut().enumerate() {
        s.index = i;
        s.clamp_scores();
    }
    let mut classes: Vec<ClassGroup> =
        serde_json::from_value(data["classes"].take()).map_err(|e| format!("{}", e))?;
    for (i, c) in classes.iter_mut().enumerate() {
        c.index = i;
    }

    let config: Config = if data["config"].is_null() {
        Config::default()
    } else {
        serde_json::from_value(data["config"].take()).map_err(|e| format!("{}", e))?
    };
    let antinomy_present = data["antinomy_present"].as_bool().unwrap_or(true);

    let offerings = Offerings::build(&classes);
    Ok((
        Snapshot {
            students,
            classes,
            offerings,
            antinomy_present,
        },
        config,
    ))
}

/// Write a balancing result as simple JSON representation to a Writer (e.g. an output file).
///
/// The assignment is a list of class indexes, one entry per student, in student list order.
pub fn write<W: std::io::Write>(writer: W, result: &OptimizeResult) -> Result<(), String> {
    let violations: serde_json::Value =
        serde_json::to_value(&result.violations).map_err(|e| format!("{}", e))?;
    let data = json!({
        "format": "X-classrepartition-simple",
        "version": "1.0",
        "ok": result.ok,
        "exhausted": result.exhausted,
        "antinomy_validated": result.antinomy_validated,
        "swaps_applied": result.swaps_applied,
        "swaps_3way": result.swaps_3way,
        "violations": violations,
        "assignment": &result.final_assignment,
    });
    serde_json::to_writer(writer, &data).map_err(|e| format!("{}", e))?;

    Ok(())
}
