use std::ops::Deref;

/// Read-only wrapper; the value can be inspected but never changed after construction
#[derive(Debug)]
pub struct Immutable<T> {
    value: T,
}

impl<T> Immutable<T> {
    pub fn new(value: T) -> Self { Self { value } }
}

impl<T> Deref for Immutable<T> {
    type Target = T;

    fn deref(&self) -> &T { &self.value }
}
