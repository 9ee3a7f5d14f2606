use ahash::HashMap;
use cdap::{CdapMessage, Opcode};

use crate::{error::Error, rib::object::RibObject};

/// A per-IPCP tree of RIB objects keyed by (class, name), with a reverse
/// index by instance id. Objects are registered by the component that owns
/// their semantics (enrollment, flow allocator, resource allocator) rather
/// than by this module, which knows nothing about what any object means.
pub struct Rib {
    objects: HashMap<(String, String), Box<dyn RibObject>>,
    by_instance: HashMap<i64, (String, String)>,
    next_instance: i64,
}

impl Rib {
    pub fn new() -> Self {
        Self {
            objects: HashMap::default(),
            by_instance: HashMap::default(),
            next_instance: 1,
        }
    }

    /// Register an object at `(class, name)`, returning its instance id.
    /// Replacing an already-registered path is rejected: the caller must
    /// `unregister` first.
    pub fn register(
        &mut self,
        class: impl Into<String>,
        name: impl Into<String>,
        object: Box<dyn RibObject>,
    ) -> Result<i64, Error> {
        let key = (class.into(), name.into());
        if self.objects.contains_key(&key) {
            return Err(Error::ObjectAlreadyExists);
        }

        let instance = self.next_instance;
        self.next_instance += 1;
        self.by_instance.insert(instance, key.clone());
        self.objects.insert(key, object);
        Ok(instance)
    }

    pub fn unregister(&mut self, class: &str, name: &str) -> Option<Box<dyn RibObject>> {
        let key = (class.to_string(), name.to_string());
        self.by_instance.retain(|_, v| *v != key);
        self.objects.remove(&key)
    }

    pub fn get(&self, class: &str, name: &str) -> Option<&(dyn RibObject)> {
        self.objects.get(&(class.to_string(), name.to_string())).map(|b| b.as_ref())
    }

    pub fn get_mut(&mut self, class: &str, name: &str) -> Option<&mut (dyn RibObject + 'static)> {
        self.objects
            .get_mut(&(class.to_string(), name.to_string()))
            .map(|b| b.as_mut())
    }

    fn resolve(&self, request: &CdapMessage) -> Result<(String, String), Error> {
        if let Some(instance) = request.obj_inst {
            return self.by_instance.get(&instance).cloned().ok_or(Error::UnknownObjectName);
        }

        let name = request.obj_name.clone().ok_or(Error::UnknownObjectName)?;
        let class = request.obj_class.clone().ok_or(Error::UnknownObjectClass)?;
        if self.objects.contains_key(&(class.clone(), name.clone())) {
            Ok((class, name))
        } else {
            Err(Error::UnknownObjectName)
        }
    }

    /// Route an incoming CDAP request to the object it names and build the
    /// reply. Scope and filter are accepted but ignored, as §4.7 specifies
    /// for the default implementation.
    pub fn dispatch(&mut self, request: &CdapMessage) -> CdapMessage {
        let mut reply = match request.opcode.response_pair() {
            Some(_) => cdap::reply_skeleton(request),
            None => {
                // Not a request opcode; nothing sensible to reply with.
                return request.clone();
            }
        };

        let outcome = self.handle(request);
        match outcome {
            Ok(value) => {
                reply.result = Some(0);
                reply.result_reason = None;
                if let Some(value) = value {
                    reply.obj_value = Some(value);
                }
            }
            Err(err) => {
                let code = crate::error::ResultCode::from(&err);
                reply.result = Some(code.code);
                reply.result_reason = Some(code.reason);
                reply.obj_value = None;
            }
        }

        reply
    }

    fn handle(&mut self, request: &CdapMessage) -> Result<Option<cdap::ObjectValue>, Error> {
        let (class, name) = self.resolve(request)?;
        let object = self
            .objects
            .get_mut(&(class, name))
            .expect("resolve returned a key that is not registered");

        match request.opcode {
            Opcode::MCreate => {
                let value = request.obj_value.clone().ok_or(Error::ObjectValueNull)?;
                object.on_create(value)?;
                Ok(None)
            }
            Opcode::MDelete => {
                object.on_delete()?;
                Ok(None)
            }
            Opcode::MRead => Ok(Some(object.on_read()?)),
            Opcode::MCancelRead => Ok(None),
            Opcode::MWrite => {
                let value = request.obj_value.clone().ok_or(Error::ObjectValueNull)?;
                object.on_write(value)?;
                Ok(None)
            }
            Opcode::MStart => {
                object.on_start()?;
                Ok(None)
            }
            Opcode::MStop => {
                object.on_stop()?;
                Ok(None)
            }
            _ => Err(Error::OperationNotAllowed),
        }
    }
}

impl Default for Rib {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use cdap::ObjectValue;

    use super::*;

    struct Counter(i64);

    impl RibObject for Counter {
        fn on_read(&self) -> Result<ObjectValue, Error> {
            Ok(ObjectValue::I64(self.0))
        }

        fn on_write(&mut self, value: ObjectValue) -> Result<(), Error> {
            match value {
                ObjectValue::I64(v) => {
                    self.0 = v;
                    Ok(())
                }
                _ => Err(Error::InvalidField("value")),
            }
        }
    }

    fn read_request(class: &str, name: &str) -> CdapMessage {
        let mut m = CdapMessage::new(Opcode::MRead, 1);
        m.obj_class = Some(class.to_string());
        m.obj_name = Some(name.to_string());
        m
    }

    #[test]
    fn reads_a_registered_object() {
        let mut rib = Rib::new();
        rib.register("counter", "/test/counter", Box::new(Counter(42))).unwrap();

        let reply = rib.dispatch(&read_request("counter", "/test/counter"));
        assert_eq!(reply.result, Some(0));
        assert_eq!(reply.obj_value, Some(ObjectValue::I64(42)));
    }

    #[test]
    fn unknown_object_name_is_reported() {
        let mut rib = Rib::new();
        let reply = rib.dispatch(&read_request("counter", "/no/such/object"));
        assert_ne!(reply.result, Some(0));
    }

    #[test]
    fn create_on_an_object_without_on_create_is_rejected() {
        let mut rib = Rib::new();
        rib.register("counter", "/test/counter", Box::new(Counter(0))).unwrap();

        let mut request = CdapMessage::new(Opcode::MCreate, 1);
        request.obj_class = Some("counter".to_string());
        request.obj_name = Some("/test/counter".to_string());
        request.obj_value = Some(ObjectValue::I64(1));

        let reply = rib.dispatch(&request);
        assert_ne!(reply.result, Some(0));
    }

    #[test]
    fn registering_the_same_path_twice_fails() {
        let mut rib = Rib::new();
        rib.register("counter", "/test/counter", Box::new(Counter(0))).unwrap();
        assert_eq!(
            rib.register("counter", "/test/counter", Box::new(Counter(0))),
            Err(Error::ObjectAlreadyExists)
        );
    }
}
