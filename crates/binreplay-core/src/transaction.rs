use crate::annotate::StatementAnnotator;

/// Accumulates annotated statements inside a `BEGIN` ... `COMMIT` envelope so
/// a whole batch can be sent to the target as one request.
pub struct TransactionBuffer<'a> {
    annotator: &'a dyn StatementAnnotator,
    statements: Vec<String>,
}

impl<'a> TransactionBuffer<'a> {
    pub fn begin(annotator: &'a dyn StatementAnnotator) -> Self {
        Self {
            annotator,
            statements: vec![annotator.annotate("BEGIN")],
        }
    }

    pub fn push(&mut self, statement: &str) {
        self.statements.push(self.annotator.annotate(statement));
    }

    /// Render the full request, terminated by an unannotated `COMMIT`.
    pub fn commit(self) -> String {
        let mut query = String::new();
        for statement in &self.statements {
            query.push_str(statement);
            query.push_str(";\n");
        }
        query.push_str("COMMIT");
        query
    }
}
