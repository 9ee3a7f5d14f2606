use cdap::ObjectValue;

use crate::error::Error;

/// One entry in the RIB: a handler for the five CDAP operations that can
/// reach it. The broker holds a `(class, name) -> Box<dyn RibObject>` map;
/// this trait is the only dynamic dispatch in the core.
///
/// Default methods return `OperationNotAllowed`, matching §4.7's framing of
/// `on_create`/`on_delete`/`on_start`/`on_stop` as operations most objects
/// never support — a concrete object overrides only the handful it does.
pub trait RibObject: Send + 'static {
    fn on_create(&mut self, _value: ObjectValue) -> Result<(), Error> {
        Err(Error::OperationNotAllowed)
    }

    fn on_delete(&mut self) -> Result<(), Error> {
        Err(Error::OperationNotAllowed)
    }

    fn on_read(&self) -> Result<ObjectValue, Error> {
        Err(Error::OperationNotAllowed)
    }

    fn on_write(&mut self, _value: ObjectValue) -> Result<(), Error> {
        Err(Error::OperationNotAllowed)
    }

    fn on_start(&mut self) -> Result<(), Error> {
        Err(Error::OperationNotAllowed)
    }

    fn on_stop(&mut self) -> Result<(), Error> {
        Err(Error::OperationNotAllowed)
    }

    /// Narrows a registered object back to its concrete type, so the
    /// component that owns it (rather than the broker) can refresh its
    /// mirrored state without the broker knowing what that state is.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
