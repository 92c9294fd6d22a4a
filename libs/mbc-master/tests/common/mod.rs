//! Shared fixtures for master integration tests

#![allow(dead_code)]
#![allow(clippy::disallowed_methods)]

use std::sync::Arc;
use std::time::Duration;

use mbc_master::{
    CommInfo, LayoutTag, MasterInterface, ModbusMaster, ParameterDescriptor, Permissions, RegisterType,
    SimulatedSlave, SimulatedTransport, PortMode,
};

pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(200);

pub type SimMaster = ModbusMaster<SimulatedTransport>;

/// cid 7, FLOAT_CDAB in holding registers 100..102 of slave 1
pub fn temperature() -> ParameterDescriptor {
    ParameterDescriptor::new(7, "temperature", LayoutTag::FloatCdab)
        .with_registers(RegisterType::Holding, 100, 2)
        .with_units("C")
        .with_perms(Permissions::READ_WRITE)
}

pub fn descriptor_table() -> Arc<[ParameterDescriptor]> {
    Arc::from(vec![
        temperature(),
        ParameterDescriptor::new(8, "setpoint", LayoutTag::U16Ab)
            .with_registers(RegisterType::Holding, 200, 1)
            .with_limits(0, 100, 1)
            .with_perms(Permissions::READ_WRITE),
        ParameterDescriptor::new(9, "serial", LayoutTag::U32Abcd).with_registers(RegisterType::Input, 0, 2),
        ParameterDescriptor::new(10, "relays", LayoutTag::U8)
            .with_registers(RegisterType::Coil, 3, 5)
            .with_perms(Permissions::READ_WRITE),
        ParameterDescriptor::new(11, "firmware", LayoutTag::U16Ab)
            .with_registers(RegisterType::Input, 10, 1)
            .with_perms(Permissions::READ_WRITE),
        ParameterDescriptor::new(12, "ratio", LayoutTag::FloatAbcd).with_registers(RegisterType::Holding, 300, 2),
    ])
}

pub fn slave() -> SimulatedSlave {
    SimulatedSlave::new(1)
        // FLOAT_CDAB image of 1.0
        .with_holding(100, &[0x0000, 0x3F80])
        .with_holding(200, &[42])
        // FLOAT_ABCD image of 1.0
        .with_holding(300, &[0x3F80, 0x0000])
        .with_input(0, &[0x1122, 0x3344])
        .with_input(10, &[0x0102])
        .with_coils(3, &[true, false, true, true, false])
        .with_slave_id(b"MBC".to_vec())
}

pub fn tcp_comm() -> CommInfo {
    CommInfo::tcp(["127.0.0.1:502"]).with_response_timeout(RESPONSE_TIMEOUT)
}

/// Master over a simulator with `slave()`, set up, started and bound to
/// `descriptor_table()`
pub async fn started_master() -> Arc<SimMaster> {
    let sim = SimulatedTransport::new(PortMode::Tcp).with_slave(slave());
    let master = Arc::new(ModbusMaster::new(sim));
    master.setup(tcp_comm()).await.unwrap();
    master.start().await.unwrap();
    master.set_descriptor(descriptor_table()).unwrap();
    master
}
