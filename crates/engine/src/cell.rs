use crate::formula::eval::FormulaError;
use crate::formula::parser::Formula;

/// What a cell holds, after the raw input string has been classified.
///
/// The empty cell is `Text("")`: enumeration skips it, but a slot that
/// was once touched may keep it around.
#[derive(Debug, Clone, PartialEq)]
pub enum CellContents {
    Number(f64),
    Text(String),
    Formula(Formula),
}

impl CellContents {
    /// Render the raw string form that reproduces this contents when fed
    /// back through classification: numbers in canonical double form,
    /// text as-is, formulas as `=` plus their canonical form.
    pub fn to_input_string(&self) -> String {
        match self {
            CellContents::Number(n) => n.to_string(),
            CellContents::Text(s) => s.clone(),
            CellContents::Formula(f) => format!("={}", f),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellContents::Text(s) if s.is_empty())
    }
}

/// The evaluated value a cell presents to readers and to dependent
/// formulas.
///
/// `Error` is a normal, storable value: formulas that divide by zero or
/// read a cell with no numeric value produce it, and it propagates to
/// dependents because their lookups fail against it in turn.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Error(FormulaError),
}

impl CellValue {
    /// Numeric view used when a formula looks this cell up. Text and
    /// error values have none, which the evaluator converts into a
    /// `FormulaError` on the dependent cell.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(_) | CellValue::Error(_) => None,
        }
    }
}

/// A named storage slot: raw contents plus the value cached by the most
/// recent successful recalculation that touched it.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub contents: CellContents,
    pub value: CellValue,
}

impl Cell {
    /// Number and text cells are their own value. A formula cell starts
    /// stale; the recalculation pass that follows every mutation assigns
    /// its real value before anyone can observe it.
    pub fn new(contents: CellContents) -> Self {
        let value = match &contents {
            CellContents::Number(n) => CellValue::Number(*n),
            CellContents::Text(s) => CellValue::Text(s.clone()),
            CellContents::Formula(_) => CellValue::Text(String::new()),
        };
        Self { contents, value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formula(text: &str) -> Formula {
        Formula::parse(text, |s| s.to_string(), |_| true).unwrap()
    }

    #[test]
    fn test_number_cell_value_is_its_contents() {
        let cell = Cell::new(CellContents::Number(2.5));
        assert_eq!(cell.value, CellValue::Number(2.5));
        assert_eq!(cell.value.as_number(), Some(2.5));
    }

    #[test]
    fn test_text_cell_value_is_its_contents() {
        let cell = Cell::new(CellContents::Text("hello".to_string()));
        assert_eq!(cell.value, CellValue::Text("hello".to_string()));
        assert_eq!(cell.value.as_number(), None);
    }

    #[test]
    fn test_error_value_has_no_number() {
        let value = CellValue::Error(FormulaError::new("division by zero"));
        assert_eq!(value.as_number(), None);
    }

    #[test]
    fn test_empty_is_empty_text_only() {
        assert!(CellContents::Text(String::new()).is_empty());
        assert!(!CellContents::Text(" ".to_string()).is_empty());
        assert!(!CellContents::Number(0.0).is_empty());
        assert!(!CellContents::Formula(formula("1+1")).is_empty());
    }

    #[test]
    fn test_input_string_round_trips_classification() {
        assert_eq!(CellContents::Number(2.0).to_input_string(), "2");
        assert_eq!(
            CellContents::Text("plain".to_string()).to_input_string(),
            "plain"
        );
        assert_eq!(
            CellContents::Formula(formula("a1 + 2.0")).to_input_string(),
            "=a1+2"
        );
    }
}
