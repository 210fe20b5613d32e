//! Destinations for generated text.

/// Receives text fragments as generation produces them.
///
/// Fragments arrive in order and are never empty. Any `FnMut(&str)` closure is a
/// sink, as are `Vec<String>` (one entry per fragment) and `String` (the
/// concatenation).
pub trait EmissionSink {
    fn emit(&mut self, fragment: &str);
}

impl<F> EmissionSink for F
where
    F: FnMut(&str),
{
    fn emit(&mut self, fragment: &str) {
        self(fragment)
    }
}

impl EmissionSink for Vec<String> {
    fn emit(&mut self, fragment: &str) {
        self.push(fragment.to_string());
    }
}

impl EmissionSink for String {
    fn emit(&mut self, fragment: &str) {
        self.push_str(fragment);
    }
}

/// Forwards to an inner sink while keeping a copy of everything emitted.
pub(crate) struct Recording<'a, S: ?Sized> {
    inner: &'a mut S,
    text: String,
}

impl<'a, S: EmissionSink + ?Sized> Recording<'a, S> {
    pub(crate) fn new(inner: &'a mut S) -> Self {
        Self {
            inner,
            text: String::new(),
        }
    }

    pub(crate) fn into_text(self) -> String {
        self.text
    }
}

impl<S: EmissionSink + ?Sized> EmissionSink for Recording<'_, S> {
    fn emit(&mut self, fragment: &str) {
        self.text.push_str(fragment);
        self.inner.emit(fragment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(sink: &mut dyn EmissionSink) {
        sink.emit("Hel");
        sink.emit("lo");
    }

    #[test]
    fn test_builtin_sinks() {
        let mut fragments: Vec<String> = Vec::new();
        feed(&mut fragments);
        assert_eq!(fragments, vec!["Hel", "lo"]);

        let mut text = String::new();
        feed(&mut text);
        assert_eq!(text, "Hello");

        let mut count = 0;
        let mut closure = |_: &str| count += 1;
        feed(&mut closure);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_recording_forwards_and_keeps_copy() {
        let mut fragments: Vec<String> = Vec::new();
        let mut recording = Recording::new(&mut fragments);
        feed(&mut recording);
        assert_eq!(recording.into_text(), "Hello");
        assert_eq!(fragments.len(), 2);
    }
}
