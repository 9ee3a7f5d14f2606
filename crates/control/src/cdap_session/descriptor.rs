use cdap::AuthType;

/// Identity and negotiated parameters of one CDAP session, populated on the
/// `M_CONNECT`/`M_CONNECT_R` exchange and consulted by every message that
/// follows on the same session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionDescriptor {
    pub abs_syntax: i32,
    pub auth_mech: Option<AuthType>,
    pub src_ap_name: String,
    pub src_ap_inst: String,
    pub src_ae_name: String,
    pub src_ae_inst: String,
    pub dest_ap_name: String,
    pub dest_ap_inst: String,
    pub dest_ae_name: String,
    pub dest_ae_inst: String,
    pub version: i32,
}
