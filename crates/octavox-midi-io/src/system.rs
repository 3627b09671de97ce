//! System root: owns the registry, the slot table, the router, and the
//! transports, and pumps them cooperatively.

use std::sync::Arc;

use crate::collab::{PerformanceStore, SysExListener, UiEventSink, VoiceEngine};
use crate::config::MidiConfig;
use crate::error::{Error, Result};
use crate::registry::DeviceRegistry;
use crate::router::Router;
use crate::slots::{VoiceSlots, VoiceSlotsReader};
use crate::transport::{
    usb_keyboard_name, DatagramLink, NetworkSessionTransport, SerialLink, SerialTransport,
    SessionLink, Transport, UdpTransport, UsbKeyboardTransport, UsbMidiPort, SERIAL_NAME,
    SESSION_NAME, UDP_NAME,
};

/// Builder for [`MidiSystem`]. Collaborators are required; transports are
/// added per configured link.
pub struct MidiSystemBuilder {
    config: MidiConfig,
    engine: Option<Arc<dyn VoiceEngine>>,
    performance: Option<Arc<dyn PerformanceStore>>,
    ui: Option<Arc<dyn UiEventSink>>,
    sysex_listener: Option<Arc<dyn SysExListener>>,
    serial: Option<Box<dyn SerialLink>>,
    usb: Vec<Box<dyn UsbMidiPort>>,
    session: Option<Box<dyn SessionLink>>,
    udp: Option<Box<dyn DatagramLink>>,
}

impl MidiSystemBuilder {
    pub fn new(config: MidiConfig) -> Self {
        Self {
            config,
            engine: None,
            performance: None,
            ui: None,
            sysex_listener: None,
            serial: None,
            usb: Vec::new(),
            session: None,
            udp: None,
        }
    }

    pub fn voice_engine(mut self, engine: Arc<dyn VoiceEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn performance_store(mut self, store: Arc<dyn PerformanceStore>) -> Self {
        self.performance = Some(store);
        self
    }

    pub fn ui_sink(mut self, sink: Arc<dyn UiEventSink>) -> Self {
        self.ui = Some(sink);
        self
    }

    pub fn sysex_listener(mut self, listener: Arc<dyn SysExListener>) -> Self {
        self.sysex_listener = Some(listener);
        self
    }

    pub fn serial(mut self, link: Box<dyn SerialLink>) -> Self {
        self.serial = Some(link);
        self
    }

    pub fn usb_keyboard(mut self, port: Box<dyn UsbMidiPort>) -> Self {
        self.usb.push(port);
        self
    }

    pub fn session(mut self, link: Box<dyn SessionLink>) -> Self {
        self.session = Some(link);
        self
    }

    pub fn udp(mut self, link: Box<dyn DatagramLink>) -> Self {
        self.udp = Some(link);
        self
    }

    pub fn build(self) -> Result<MidiSystem> {
        let engine = self
            .engine
            .ok_or(Error::MissingCollaborator("voice engine"))?;
        let performance = self
            .performance
            .ok_or(Error::MissingCollaborator("performance store"))?;
        if self.usb.len() > self.config.usb_keyboards {
            return Err(Error::InvalidConfig(format!(
                "{} USB keyboards attached, {} configured",
                self.usb.len(),
                self.config.usb_keyboards
            )));
        }

        let slots = Arc::new(VoiceSlots::new(self.config.slot_count));
        let registry = Arc::new(DeviceRegistry::new());
        let router = Arc::new(Router::new(
            self.config.clone(),
            Arc::clone(&slots),
            Arc::clone(&registry),
            engine,
            performance,
            self.ui,
            self.sysex_listener,
        ));

        let mut transports = Vec::new();
        if let Some(link) = self.serial {
            let rx = registry.register(SERIAL_NAME)?;
            transports.push(Transport::Serial(SerialTransport::new(
                SERIAL_NAME.to_string(),
                link,
                rx,
            )));
        }
        for (instance, port) in self.usb.into_iter().enumerate() {
            let name = usb_keyboard_name(instance);
            let rx = registry.register(&name)?;
            transports.push(Transport::UsbKeyboard(UsbKeyboardTransport::new(
                name, port, rx,
            )));
        }
        if let Some(link) = self.session {
            let rx = registry.register(SESSION_NAME)?;
            transports.push(Transport::NetworkSession(NetworkSessionTransport::new(
                SESSION_NAME.to_string(),
                link,
                rx,
            )));
        }
        if let Some(link) = self.udp {
            let rx = registry.register(UDP_NAME)?;
            let fallback = if self.config.udp_fallback_to_session {
                registry.sender(SESSION_NAME)
            } else {
                None
            };
            transports.push(Transport::UdpBroadcast(UdpTransport::new(
                UDP_NAME.to_string(),
                link,
                rx,
                fallback,
            )));
        }

        if self.config.thru_enabled() && registry.sender(&self.config.thru_out).is_none() {
            tracing::warn!(
                thru_out = %self.config.thru_out,
                "Thru destination is not a registered transport"
            );
        }

        Ok(MidiSystem {
            router,
            registry,
            slots,
            transports,
        })
    }
}

pub struct MidiSystem {
    router: Arc<Router>,
    registry: Arc<DeviceRegistry>,
    slots: Arc<VoiceSlots>,
    transports: Vec<Transport>,
}

impl MidiSystem {
    pub fn builder(config: MidiConfig) -> MidiSystemBuilder {
        MidiSystemBuilder::new(config)
    }

    /// Pump every transport once, in registration order. Messages within
    /// one transport keep arrival order; no ordering holds across
    /// transports beyond poll order.
    pub fn poll(&mut self) {
        for transport in &mut self.transports {
            transport.poll(&self.router);
        }
    }

    #[inline]
    pub fn router(&self) -> &Router {
        &self.router
    }

    #[inline]
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    #[inline]
    pub fn slots(&self) -> &VoiceSlots {
        &self.slots
    }

    /// Lock-free reader handle for audio-rendering contexts.
    pub fn slots_reader(&self) -> VoiceSlotsReader {
        self.slots.reader()
    }

    pub fn transport_names(&self) -> Vec<&str> {
        self.transports.iter().map(|t| t.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{NullEngine, NullStore};

    #[test]
    fn test_build_requires_collaborators() {
        let err = MidiSystem::builder(MidiConfig::default()).build();
        assert!(matches!(err, Err(Error::MissingCollaborator(_))));
    }

    #[test]
    fn test_build_empty_system() {
        let system = MidiSystem::builder(MidiConfig::default())
            .voice_engine(Arc::new(NullEngine))
            .performance_store(Arc::new(NullStore))
            .build()
            .unwrap();
        assert!(system.transport_names().is_empty());
        assert_eq!(system.slots().len(), 8);
    }

    #[test]
    fn test_usb_count_enforced() {
        struct NoPort;
        impl crate::transport::UsbMidiPort for NoPort {
            fn read_packet(&mut self, _buf: &mut [u8]) -> Option<(u8, usize)> {
                None
            }
            fn write_packets(&mut self, _packets: &[u8]) -> std::io::Result<()> {
                Ok(())
            }
            fn write_plain(&mut self, _bytes: &[u8]) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut config = MidiConfig::default();
        config.usb_keyboards = 1;
        let err = MidiSystem::builder(config)
            .voice_engine(Arc::new(NullEngine))
            .performance_store(Arc::new(NullStore))
            .usb_keyboard(Box::new(NoPort))
            .usb_keyboard(Box::new(NoPort))
            .build();
        assert!(matches!(err, Err(Error::InvalidConfig(_))));
    }
}
