use crate::{CdapMessage, Error, Opcode};

/// Validates a CDAP message against its required-field rules: one check
/// per opcode family plus the cross-cutting response-shape rules.
pub struct Validator;

impl Validator {
    pub fn validate(msg: &CdapMessage) -> Result<(), Error> {
        Self::validate_invoke_id(msg)?;
        Self::validate_result_shape(msg)?;

        match msg.opcode {
            Opcode::NoOpcode => Err(Error::InvalidField("opcode")),
            Opcode::MConnect => Self::validate_connect(msg),
            Opcode::MConnectR => Ok(()),
            Opcode::MRelease => Ok(()),
            Opcode::MReleaseR => Ok(()),
            Opcode::MCreate | Opcode::MWrite => Self::validate_create_or_write(msg),
            Opcode::MCreateR | Opcode::MWriteR => Ok(()),
            Opcode::MDelete
            | Opcode::MRead
            | Opcode::MStart
            | Opcode::MStop => Self::validate_addressed_by_class_name_or_instance(msg),
            Opcode::MDeleteR | Opcode::MReadR | Opcode::MStartR | Opcode::MStopR => Ok(()),
            Opcode::MCancelRead | Opcode::MCancelReadR => Ok(()),
        }
    }

    fn validate_invoke_id(msg: &CdapMessage) -> Result<(), Error> {
        if msg.invoke_id == 0 {
            return Err(Error::InvalidField("invoke_id"));
        }
        Ok(())
    }

    /// `result` is mandatory on responses and forbidden on requests.
    fn validate_result_shape(msg: &CdapMessage) -> Result<(), Error> {
        if msg.opcode.is_response() {
            if msg.result.is_none() {
                return Err(Error::RequiredFieldMissing("result"));
            }
        } else if msg.result.is_some() {
            return Err(Error::InvalidField("result"));
        }
        Ok(())
    }

    fn validate_connect(msg: &CdapMessage) -> Result<(), Error> {
        if msg.abs_syntax.is_none() {
            return Err(Error::RequiredFieldMissing("abs_syntax"));
        }
        if msg.src_ap_name.as_deref().unwrap_or("").is_empty() {
            return Err(Error::RequiredFieldMissing("src_ap_name"));
        }
        if msg.dest_ap_name.as_deref().unwrap_or("").is_empty() {
            return Err(Error::RequiredFieldMissing("dest_ap_name"));
        }
        if msg.auth_mech.is_none() {
            return Err(Error::RequiredFieldMissing("auth_mech"));
        }
        if msg.auth_value.is_none() {
            return Err(Error::RequiredFieldMissing("auth_value"));
        }
        Ok(())
    }

    /// `M_CREATE`/`M_WRITE`: needs (class ∨ instance), (name ∨ instance),
    /// and an object value.
    fn validate_create_or_write(msg: &CdapMessage) -> Result<(), Error> {
        if msg.obj_class.is_none() && msg.obj_inst.is_none() {
            return Err(Error::RequiredFieldMissing("obj_class|obj_inst"));
        }
        if msg.obj_name.is_none() && msg.obj_inst.is_none() {
            return Err(Error::RequiredFieldMissing("obj_name|obj_inst"));
        }
        if msg.obj_value.is_none() {
            return Err(Error::RequiredFieldMissing("obj_value"));
        }
        Ok(())
    }

    /// `M_DELETE`/`M_READ`/`M_START`/`M_STOP`: needs either (class AND name)
    /// or an instance.
    fn validate_addressed_by_class_name_or_instance(msg: &CdapMessage) -> Result<(), Error> {
        let by_class_and_name = msg.obj_class.is_some() && msg.obj_name.is_some();
        if !by_class_and_name && msg.obj_inst.is_none() {
            return Err(Error::RequiredFieldMissing("(obj_class,obj_name)|obj_inst"));
        }
        Ok(())
    }
}

/// Builds the reply skeleton for a request: every field copied except
/// `opcode` (paired response code), `result` (set to success) and
/// `result_reason` (left empty).
pub fn reply_skeleton(request: &CdapMessage) -> CdapMessage {
    let opcode = request
        .opcode
        .response_pair()
        .expect("reply_skeleton called on a non-request opcode");

    CdapMessage {
        opcode,
        result: Some(0),
        result_reason: None,
        ..request.clone()
    }
}
