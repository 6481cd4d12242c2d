//! # Sequence Proxy
//!
//! Proxies for remote element collections, the objects whose class name
//! carries the `array::` marker.
//!
//! Indexing follows the remote `at` method and is 0-based. Application
//! commands that take their own 1-based indices pass them through unchanged;
//! this type never converts between the two.

use std::iter::FusedIterator;

use osapack::ARRAY_CLASS_PREFIX;

use crate::class_map::ProxyClass;
use crate::error::Result;
use crate::proxy::ObjectProxy;
use crate::value::FromValue;
use crate::value::Kwargs;
use crate::value::Value;

/// A remote collection of elements.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayProxy {
    proxy: ObjectProxy,
}

impl ArrayProxy {
    /// Wraps `proxy` when it resolved to the sequence type.
    pub fn try_from_proxy(proxy: ObjectProxy) -> std::result::Result<Self, ObjectProxy> {
        if proxy.proxy_class() == ProxyClass::ARRAY {
            Ok(Self { proxy })
        } else {
            Err(proxy)
        }
    }

    pub fn proxy(&self) -> &ObjectProxy {
        &self.proxy
    }

    pub fn into_proxy(self) -> ObjectProxy {
        self.proxy
    }

    /// Remote class of the elements, e.g. `record` for `array::record`.
    pub fn element_class(&self) -> Option<&str> {
        self.proxy
            .class_name()
            .and_then(|c| c.strip_prefix(ARRAY_CLASS_PREFIX))
    }

    /// Number of elements, read from the `length` property.
    pub fn len(&self) -> Result<usize> {
        self.proxy.get("length")
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// The element at the 0-based `index`.
    pub fn at(&self, index: usize) -> Result<Value> {
        self.proxy.call_method("at", vec![index.into()], Kwargs::new())
    }

    pub fn get<T: FromValue>(&self, index: usize) -> Result<T> {
        T::from_value(self.at(index)?)
    }

    /// Narrows the collection with a remote filter specification.
    pub fn whose(&self, filter: impl Into<Value>) -> Result<ArrayProxy> {
        self.proxy.invoke("whose", vec![filter.into()], Kwargs::new())
    }

    /// Fetches every element in one round trip by invoking the collection.
    pub fn to_vec(&self) -> Result<Vec<Value>> {
        self.proxy.call_self(Vec::new(), Kwargs::new())?.extract()
    }

    /// Fetches every element in one round trip, converted to `T`.
    pub fn collect<T: FromValue>(&self) -> Result<Vec<T>> {
        self.to_vec()?.into_iter().map(T::from_value).collect()
    }

    /// Walks the elements one `at` call at a time.
    pub fn iter(&self) -> Elements {
        Elements {
            array: self.clone(),
            next: 0,
            len: None,
            done: false,
        }
    }
}

/// Lazy forward traversal over a remote collection.
///
/// The length is read once, on the first step. Each element costs one round
/// trip. The first error is yielded and ends the traversal.
pub struct Elements {
    array: ArrayProxy,
    next: usize,
    len: Option<usize>,
    done: bool,
}

impl Elements {
    fn len(&mut self) -> Result<usize> {
        match self.len {
            Some(len) => Ok(len),
            None => {
                let len = self.array.len()?;
                self.len = Some(len);
                Ok(len)
            }
        }
    }
}

impl Iterator for Elements {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let len = match self.len() {
            Ok(len) => len,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        if self.next >= len {
            self.done = true;
            return None;
        }

        let index = self.next;
        self.next += 1;
        let item = self.array.at(index);
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}

impl FusedIterator for Elements {}

impl IntoIterator for &ArrayProxy {
    type Item = Result<Value>;
    type IntoIter = Elements;

    fn into_iter(self) -> Elements {
        self.iter()
    }
}

impl IntoIterator for ArrayProxy {
    type Item = Result<Value>;
    type IntoIter = Elements;

    fn into_iter(self) -> Elements {
        Elements {
            array: self,
            next: 0,
            len: None,
            done: false,
        }
    }
}
