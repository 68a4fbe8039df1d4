//! Multidimensional numeric buffers exchanged with the host runtime.
//!
//! The native side allocates or accepts these without inspecting their
//! contents; the adapter moves the element storage as a host typed array.

/// Dense row-major numeric buffer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NdBuffer<T> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
}

impl<T> NdBuffer<T> {
    /// The shape of a default-constructed array: one empty dimension.
    pub fn empty() -> Self {
        Self {
            shape: vec![0],
            data: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer() {
        let buf = NdBuffer::<i32>::empty();
        assert_eq!(buf.shape, vec![0]);
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
    }
}
