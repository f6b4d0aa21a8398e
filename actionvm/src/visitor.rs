use crate::{ObjectId, StringId, Value};

/// Something holding heap references that the collector has to trace.
///
/// Visiting an entity reports only its direct edges; the collector keeps
/// its own worklist for the transitive walk.
pub trait Visitable {
    fn visit_edges(&self, visitor: &mut impl Visitor);
}

pub trait Visitor: Sized {
    fn visit_object(&mut self, id: ObjectId);
    fn visit_string(&mut self, id: StringId);

    #[inline]
    fn visit(&mut self, value: Value) {
        match value {
            Value::Object(id) => self.visit_object(id),
            Value::String(id) => self.visit_string(id),
            _ => (),
        }
    }
}

impl Visitable for Value {
    #[inline]
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        visitor.visit(*self);
    }
}

impl<T: Visitable> Visitable for [T] {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        self.iter().for_each(|v| v.visit_edges(visitor));
    }
}

impl Visitable for ObjectId {
    #[inline]
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        visitor.visit_object(*self);
    }
}

impl Visitable for StringId {
    #[inline]
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        visitor.visit_string(*self);
    }
}

impl<T: Visitable> Visitable for Option<T> {
    #[inline]
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        if let Some(inner) = self {
            inner.visit_edges(visitor);
        }
    }
}
