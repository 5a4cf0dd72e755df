use crate::error::InputError;

/// State of the import modal: visibility plus the name being typed.
#[derive(Debug, Clone, Default)]
pub struct ImportForm {
    open: bool,
    buffer: String,
}

impl ImportForm {
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    pub fn hide(&mut self) {
        self.open = false;
    }

    pub fn push(&mut self, c: char) {
        self.buffer.push(c);
    }

    pub fn pop(&mut self) {
        self.buffer.pop();
    }

    /// Trimmed name ready to hand to the backend.
    pub fn submission(&self) -> Result<String, InputError> {
        let name = self.buffer.trim();
        if name.is_empty() {
            return Err(InputError::EmptyName);
        }
        Ok(name.to_string())
    }

    pub fn clear_and_hide(&mut self) {
        self.buffer.clear();
        self.open = false;
    }
}
