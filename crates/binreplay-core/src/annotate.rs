/// Decorates statements with traceability metadata before they are sent to
/// the target.
pub trait StatementAnnotator: Send + Sync {
    fn annotate(&self, statement: &str) -> String;
}

/// Prefixes every statement with a `/*...*/` comment.
#[derive(Debug, Clone)]
pub struct Marginalia {
    comment: String,
}

impl Marginalia {
    pub fn new(text: impl AsRef<str>) -> Self {
        // Comment delimiters inside the text would end the comment early, or
        // open a nested one on targets that nest block comments.
        let comment = text.as_ref().replace("*/", "* /").replace("/*", "/ *");
        Self { comment }
    }
}

impl StatementAnnotator for Marginalia {
    fn annotate(&self, statement: &str) -> String {
        format!("/*{}*/ {}", self.comment, statement)
    }
}

/// Leaves statements untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAnnotation;

impl StatementAnnotator for NoAnnotation {
    fn annotate(&self, statement: &str) -> String {
        statement.to_string()
    }
}
