//! JSON report formatter

use super::ReportFormatter;
use crate::exporter::ReportModel;
use crate::result::LinecovResult;

/// Pretty-printed JSON of the whole report model
#[derive(Debug)]
pub struct JsonFormatter<'a> {
    model: &'a ReportModel,
    pretty: bool,
}

impl<'a> JsonFormatter<'a> {
    /// Create a pretty-printing formatter
    #[must_use]
    pub const fn new(model: &'a ReportModel) -> Self {
        Self {
            model,
            pretty: true,
        }
    }

    /// Emit compact JSON instead
    #[must_use]
    pub const fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }
}

impl ReportFormatter for JsonFormatter<'_> {
    fn generate(&self) -> LinecovResult<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(self.model)?
        } else {
            serde_json::to_string(self.model)?
        };
        Ok(json)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_model_compact() {
        let model = ReportModel::default();
        let json = JsonFormatter::new(&model).compact().generate().unwrap();
        assert_eq!(json, r#"{"files":[]}"#);
    }

    #[test]
    fn test_save_and_read_back() {
        let model = ReportModel::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.json");
        JsonFormatter::new(&model).save(&path).unwrap();
        let back: ReportModel =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, model);
    }
}
