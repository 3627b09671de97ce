//! Message routing and dispatch.
//!
//! One completed message enters, global effects apply first (Thru mirror,
//! master volume), then per-voice-slot dispatch according to the channel
//! map. Dispatch of a single message runs under one advisory lock, so two
//! transports polled from different contexts can never interleave partial
//! effects. The audio-side readers of the slot table are NOT synchronized
//! with this lock; they tolerate one processing block of staleness.

use std::sync::Arc;

use parking_lot::Mutex;

use octavox_midi::{
    cc, decode_midi14, status, ChannelAssignment, ChannelMessage, Message, RealTimeMessage,
    SysExMessage,
};

use crate::collab::{PerformanceStore, SysExListener, UiEventSink, VoiceEngine};
use crate::config::MidiConfig;
use crate::registry::DeviceRegistry;
use crate::slots::VoiceSlots;
use crate::system_cc::{CcRole, SystemCcMap};
use crate::sysex::{
    self, performance,
    voice::{CommonField, VoiceParam},
    SysExCommand, SysExReject,
};

pub struct Router {
    config: MidiConfig,
    system_cc: SystemCcMap,
    slots: Arc<VoiceSlots>,
    registry: Arc<DeviceRegistry>,
    engine: Arc<dyn VoiceEngine>,
    performance: Arc<dyn PerformanceStore>,
    ui: Option<Arc<dyn UiEventSink>>,
    sysex_listener: Option<Arc<dyn SysExListener>>,
    dispatch_lock: Mutex<()>,
}

impl Router {
    pub fn new(
        config: MidiConfig,
        slots: Arc<VoiceSlots>,
        registry: Arc<DeviceRegistry>,
        engine: Arc<dyn VoiceEngine>,
        performance: Arc<dyn PerformanceStore>,
        ui: Option<Arc<dyn UiEventSink>>,
        sysex_listener: Option<Arc<dyn SysExListener>>,
    ) -> Self {
        let system_cc = SystemCcMap::new(&config);
        Self {
            config,
            system_cc,
            slots,
            registry,
            engine,
            performance,
            ui,
            sysex_listener,
            dispatch_lock: Mutex::new(()),
        }
    }

    #[inline]
    pub fn slots(&self) -> &VoiceSlots {
        &self.slots
    }

    #[inline]
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// The controller-identification tap for USB transports.
    #[inline]
    pub fn sysex_listener(&self) -> Option<&Arc<dyn SysExListener>> {
        self.sysex_listener.as_ref()
    }

    /// Dispatch one message from the named transport.
    pub fn dispatch(&self, msg: Message, origin: &str) {
        if self.config.dump_enabled {
            log_message(&msg, origin);
        }

        // Thru mirror: unconditional byte-for-byte forward, independent of
        // any channel matching.
        if self.config.thru_enabled() && origin == self.config.thru_in {
            self.registry
                .send_to(&self.config.thru_out, &msg.to_bytes());
        }

        let _guard = self.dispatch_lock.lock();
        match msg {
            Message::RealTime(rt) => {
                if rt == RealTimeMessage::TimingClock {
                    if let Some(ui) = &self.ui {
                        ui.clock_tick();
                    }
                }
            }
            Message::SysEx(sysex) => self.dispatch_sysex(&sysex, origin),
            Message::Channel { channel, msg } => self.dispatch_channel(channel, msg),
        }
    }

    fn dispatch_sysex(&self, sysex: &SysExMessage, origin: &str) {
        let bytes = sysex.as_bytes();

        if is_master_volume(bytes) {
            let volume = decode_midi14(bytes[5], bytes[6]) as f32 / 16384.0;
            tracing::debug!(volume, "master volume SysEx");
            self.engine.set_master_volume(volume);
            return;
        }

        if performance::is_performance_frame(bytes) {
            performance::handle(bytes, &*self.performance, &self.slots, |resp| {
                self.registry.send_to(origin, &resp);
            });
            return;
        }

        // Vendor SysEx addressed by the embedded channel nibble; same
        // matching rule as channel messages, so Omni slots hear it too.
        let Some(channel) = sysex.embedded_channel() else {
            return;
        };
        for slot in 0..self.slots.len() {
            if self.slots.assignment(slot).matches(channel) {
                tracing::debug!(channel, len = sysex.len(), slot, "per-slot SysEx");
                self.handle_slot_sysex(bytes, slot);
            }
        }
    }

    fn handle_slot_sysex(&self, frame: &[u8], slot: usize) {
        match sysex::classify(frame) {
            Ok(SysExCommand::VoiceDumpRequest) => self.send_voice_dump(slot),
            Ok(SysExCommand::FunctionParameter { param, value }) => {
                tracing::debug!(?param, value, slot, "function parameter change");
                self.engine.set_function_parameter(param, value, slot);
            }
            Ok(SysExCommand::VoiceParameter { param, value }) => {
                let value = param.clamp(value);
                tracing::debug!(offset = param.offset(), value, slot, "voice parameter change");
                self.engine.set_voice_parameter(param, value, slot);
                if param == VoiceParam::Common(CommonField::Algorithm) {
                    // An algorithm switch re-patches the operator graph;
                    // sounding notes would hang.
                    self.engine.notes_off(0, slot);
                }
            }
            Ok(SysExCommand::OperatorMask { mask }) => {
                tracing::debug!(mask, slot, "operator enable mask");
                self.engine.set_operator_mask(mask, slot);
            }
            Ok(SysExCommand::VoiceBulk { payload }) => {
                tracing::debug!(slot, "voice bulk upload");
                self.engine.load_voice(payload, slot);
            }
            Ok(SysExCommand::BankBulk { .. }) => {
                // Validated and accepted; persisting a bank image is
                // intentionally not implemented.
                tracing::info!(slot, "bank bulk upload accepted, storage not implemented");
            }
            Err(reject @ (SysExReject::VoiceChecksum | SysExReject::BankChecksum)) => {
                tracing::warn!(%reject, slot, "bulk transfer checksum failed, zero mutation");
            }
            Err(reject) => {
                tracing::warn!(%reject, slot, "SysEx rejected");
            }
        }
    }

    fn send_voice_dump(&self, slot: usize) {
        let image = self.engine.voice_dump(slot);
        let channel = match self.slots.assignment(slot) {
            ChannelAssignment::Channel(ch) => ch,
            _ => 0,
        };
        let frame = sysex::voice_dump_frame(channel, &image);
        tracing::debug!(slot, "broadcasting voice dump");
        // Dumps go to every interface, not just the requesting one.
        self.registry.broadcast(&frame);
    }

    fn dispatch_channel(&self, channel: u8, msg: ChannelMessage) {
        // System-wide overrides resolve before any per-slot matching, and
        // they stop dispatch: first responder wins.
        if let ChannelMessage::ControlChange { controller, value } = msg {
            if let Some((role, slot)) = self.system_cc.resolve(controller) {
                tracing::debug!(controller, ?role, slot, "System-CC override");
                self.apply_system_cc(role, value, slot);
                return;
            }
        }

        if let ChannelMessage::ProgramChange { program } = msg {
            if self.config.performance_select_channel.matches(channel) {
                if !self.performance.select_performance(program) {
                    tracing::warn!(program, "performance select out of range");
                }
                return;
            }
        }

        for slot in 0..self.slots.len() {
            if self.slots.assignment(slot).matches(channel) {
                self.apply_channel_message(msg, slot);
            }
        }
    }

    fn apply_system_cc(&self, role: CcRole, value: u8, slot: usize) {
        match role {
            CcRole::Volume => self.engine.set_volume(value, slot),
            CcRole::Pan => self.engine.set_pan(value, slot),
            CcRole::Detune => self.apply_detune(value, slot),
        }
    }

    fn apply_detune(&self, value: u8, slot: usize) {
        if value == 0 {
            // 0 means no celeste effect at all.
            self.engine.set_master_tune(0, slot);
        } else {
            self.engine.set_master_tune(scale_detune(value), slot);
        }
    }

    fn apply_channel_message(&self, msg: ChannelMessage, slot: usize) {
        let engine = &*self.engine;
        match msg {
            ChannelMessage::NoteOn { key, velocity } => {
                if velocity > 0 {
                    engine.key_down(key, velocity, slot);
                } else {
                    engine.key_up(key, slot);
                }
                if let Some(ui) = &self.ui {
                    ui.note_event(slot, key, velocity, velocity > 0);
                }
            }
            ChannelMessage::NoteOff { key, .. } => {
                engine.key_up(key, slot);
                if let Some(ui) = &self.ui {
                    ui.note_event(slot, key, 0, false);
                }
            }
            // Polyphonic aftertouch is not supported by the voice engine;
            // only channel aftertouch is mapped.
            ChannelMessage::PolyPressure { .. } => {}
            ChannelMessage::ChannelPressure { pressure } => {
                engine.set_aftertouch(pressure, slot);
                engine.controllers_refresh(slot);
            }
            ChannelMessage::ControlChange { controller, value } => {
                self.apply_control_change(controller, value, slot);
            }
            ChannelMessage::ProgramChange { program } => {
                if self.config.rx_program_change {
                    engine.program_change(program, slot);
                }
            }
            ChannelMessage::PitchBend { value } => {
                engine.set_pitch_bend(value, slot);
            }
        }
    }

    fn apply_control_change(&self, controller: u8, value: u8, slot: usize) {
        let engine = &*self.engine;
        match controller {
            cc::MODULATION => {
                engine.set_mod_wheel(value, slot);
                engine.controllers_refresh(slot);
            }
            cc::BREATH_CONTROLLER => {
                engine.set_breath_controller(value, slot);
                engine.controllers_refresh(slot);
            }
            cc::FOOT_PEDAL => {
                engine.set_foot_controller(value, slot);
                engine.controllers_refresh(slot);
            }
            cc::VOLUME => engine.set_volume(value, slot),
            cc::PAN_POSITION => engine.set_pan(value, slot),
            cc::BANK_SELECT_LSB => engine.bank_select_lsb(value, slot),
            cc::SUSTAIN => engine.set_sustain(value >= 64, slot),
            cc::RESONANCE => engine.set_resonance(scale_to_99(value), slot),
            cc::FREQUENCY_CUTOFF => engine.set_cutoff(scale_to_99(value), slot),
            cc::REVERB_LEVEL => engine.set_reverb_send(scale_to_99(value), slot),
            cc::DETUNE_LEVEL => self.apply_detune(value, slot),
            cc::ALL_SOUND_OFF => engine.panic(value, slot),
            cc::ALL_NOTES_OFF => engine.notes_off(value, slot),
            _ => return,
        }
        if let Some(ui) = &self.ui {
            ui.control_event(slot, controller, value);
        }
    }
}

/// Fixed-shape universal realtime master volume frame:
/// `F0 7F 7F 04 01 ll mm F7`, 14-bit value LSB first.
fn is_master_volume(frame: &[u8]) -> bool {
    frame.len() == 8
        && frame[1] == 0x7F
        && frame[2] == 0x7F
        && frame[3] == 0x04
        && frame[4] == 0x01
        && frame[7] == status::SYSEX_END
}

/// 0..=127 to 0..=99.
#[inline]
fn scale_to_99(value: u8) -> u8 {
    (value as u32 * 99 / 127) as u8
}

/// 1..=127 to -99..=99 (0 handled by the caller).
#[inline]
fn scale_detune(value: u8) -> i8 {
    ((value.min(127) as i32 - 1) * 198 / 126 - 99) as i8
}

fn log_message(msg: &Message, origin: &str) {
    match msg {
        Message::RealTime(RealTimeMessage::TimingClock)
        | Message::RealTime(RealTimeMessage::ActiveSensing) => {}
        Message::SysEx(sysex) => {
            tracing::debug!(origin, len = sysex.len(), "SysEx frame");
        }
        other => {
            tracing::debug!(origin, bytes = ?other.to_bytes(), "MIDI message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::ParamDomain;
    use parking_lot::Mutex as PlMutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        KeyDown(u8, u8, usize),
        KeyUp(u8, usize),
        Volume(u8, usize),
        Pan(u8, usize),
        MasterTune(i8, usize),
        Cutoff(u8, usize),
        MasterVolume(f32),
        LoadVoice(usize),
        NotesOff(usize),
        VoiceParam(u16, u8, usize),
        OperatorMask(u8, usize),
        Program(u8, usize),
    }

    #[derive(Default)]
    struct RecordingEngine {
        calls: PlMutex<Vec<Call>>,
    }

    impl RecordingEngine {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }
    }

    impl VoiceEngine for RecordingEngine {
        fn key_down(&self, key: u8, velocity: u8, slot: usize) {
            self.calls.lock().push(Call::KeyDown(key, velocity, slot));
        }
        fn key_up(&self, key: u8, slot: usize) {
            self.calls.lock().push(Call::KeyUp(key, slot));
        }
        fn set_volume(&self, value: u8, slot: usize) {
            self.calls.lock().push(Call::Volume(value, slot));
        }
        fn set_pan(&self, value: u8, slot: usize) {
            self.calls.lock().push(Call::Pan(value, slot));
        }
        fn set_master_tune(&self, value: i8, slot: usize) {
            self.calls.lock().push(Call::MasterTune(value, slot));
        }
        fn set_cutoff(&self, value: u8, slot: usize) {
            self.calls.lock().push(Call::Cutoff(value, slot));
        }
        fn set_master_volume(&self, volume: f32) {
            self.calls.lock().push(Call::MasterVolume(volume));
        }
        fn load_voice(&self, _image: &[u8], slot: usize) {
            self.calls.lock().push(Call::LoadVoice(slot));
        }
        fn notes_off(&self, _value: u8, slot: usize) {
            self.calls.lock().push(Call::NotesOff(slot));
        }
        fn set_voice_parameter(&self, param: VoiceParam, value: u8, slot: usize) {
            self.calls
                .lock()
                .push(Call::VoiceParam(param.offset(), value, slot));
        }
        fn set_operator_mask(&self, mask: u8, slot: usize) {
            self.calls.lock().push(Call::OperatorMask(mask, slot));
        }
        fn program_change(&self, program: u8, slot: usize) {
            self.calls.lock().push(Call::Program(program, slot));
        }
        fn voice_dump(&self, _slot: usize) -> Vec<u8> {
            (0..155).map(|i| (i % 100) as u8).collect()
        }
    }

    #[derive(Default)]
    struct NullStore {
        selected: PlMutex<Vec<u8>>,
    }

    impl PerformanceStore for NullStore {
        fn global_parameter(&self, _param: u16) -> Option<u16> {
            None
        }
        fn set_global_parameter(&self, _param: u16, _value: u16) -> bool {
            false
        }
        fn slot_parameter(&self, _param: u16, _slot: usize) -> Option<u16> {
            None
        }
        fn set_slot_parameter(&self, _param: u16, _value: u16, _slot: usize) -> bool {
            false
        }
        fn reload_domain(&self, _domain: ParamDomain) {}
        fn select_performance(&self, program: u8) -> bool {
            self.selected.lock().push(program);
            true
        }
    }

    struct Fixture {
        router: Router,
        engine: Arc<RecordingEngine>,
        store: Arc<NullStore>,
    }

    fn fixture(config: MidiConfig) -> Fixture {
        let engine = Arc::new(RecordingEngine::default());
        let store = Arc::new(NullStore::default());
        let slots = Arc::new(VoiceSlots::new(config.slot_count));
        let registry = Arc::new(DeviceRegistry::new());
        let router = Router::new(
            config,
            slots,
            registry,
            engine.clone(),
            store.clone(),
            None,
            None,
        );
        Fixture {
            router,
            engine,
            store,
        }
    }

    fn note_on(channel: u8, key: u8, velocity: u8) -> Message {
        Message::Channel {
            channel,
            msg: ChannelMessage::NoteOn { key, velocity },
        }
    }

    #[test]
    fn test_channel_matching_rule() {
        let f = fixture(MidiConfig::default());
        f.router.slots().set_assignment(0, ChannelAssignment::Omni);
        f.router
            .slots()
            .set_assignment(1, ChannelAssignment::Channel(2));

        f.router.dispatch(note_on(1, 0x3C, 0x40), "serial");
        assert_eq!(f.engine.calls(), vec![Call::KeyDown(0x3C, 0x40, 0)]);
    }

    #[test]
    fn test_omni_slot_hears_every_channel() {
        let f = fixture(MidiConfig::default());
        f.router.slots().set_assignment(3, ChannelAssignment::Omni);

        for channel in 0..16 {
            f.router.dispatch(note_on(channel, 60, 1), "serial");
        }
        assert_eq!(f.engine.calls().len(), 16);
    }

    #[test]
    fn test_note_on_zero_velocity_is_key_up() {
        let f = fixture(MidiConfig::default());
        f.router
            .slots()
            .set_assignment(0, ChannelAssignment::Channel(0));

        f.router.dispatch(note_on(0, 60, 0), "serial");
        assert_eq!(f.engine.calls(), vec![Call::KeyUp(60, 0)]);
    }

    #[test]
    fn test_master_volume_sysex() {
        let f = fixture(MidiConfig::default());
        let sysex =
            SysExMessage::new(vec![0xF0, 0x7F, 0x7F, 0x04, 0x01, 0x00, 0x40, 0xF7]).unwrap();
        f.router.dispatch(Message::SysEx(sysex), "serial");
        assert_eq!(f.engine.calls(), vec![Call::MasterVolume(0.5)]);
    }

    #[test]
    fn test_sysex_embedded_channel_matches_omni_and_explicit() {
        let f = fixture(MidiConfig::default());
        f.router.slots().set_assignment(2, ChannelAssignment::Omni);
        f.router
            .slots()
            .set_assignment(5, ChannelAssignment::Channel(3));

        // Voice parameter change addressed to embedded channel 3.
        let sysex =
            SysExMessage::new(vec![0xF0, 0x43, 0x13, 0x01, 0x06, 0x0C, 0xF7]).unwrap();
        f.router.dispatch(Message::SysEx(sysex), "serial");

        let calls = f.engine.calls();
        assert!(calls.contains(&Call::VoiceParam(134, 12, 2)));
        assert!(calls.contains(&Call::VoiceParam(134, 12, 5)));
    }

    #[test]
    fn test_algorithm_change_forces_notes_off() {
        let f = fixture(MidiConfig::default());
        f.router
            .slots()
            .set_assignment(0, ChannelAssignment::Channel(0));

        let sysex =
            SysExMessage::new(vec![0xF0, 0x43, 0x10, 0x01, 0x06, 0x1F, 0xF7]).unwrap();
        f.router.dispatch(Message::SysEx(sysex), "serial");
        assert_eq!(
            f.engine.calls(),
            vec![Call::VoiceParam(134, 31, 0), Call::NotesOff(0)]
        );
    }

    #[test]
    fn test_voice_bulk_checksum_guard() {
        let f = fixture(MidiConfig::default());
        f.router
            .slots()
            .set_assignment(0, ChannelAssignment::Channel(0));

        let image: Vec<u8> = (0..155).map(|i| (i % 100) as u8).collect();
        let mut frame = sysex::voice_dump_frame(0, &image);
        frame[30] ^= 0x04;
        let sysex = SysExMessage::new(frame).unwrap();
        f.router.dispatch(Message::SysEx(sysex), "serial");
        // Rejected: zero mutation.
        assert!(f.engine.calls().is_empty());

        let good = SysExMessage::new(sysex::voice_dump_frame(0, &image)).unwrap();
        f.router.dispatch(Message::SysEx(good), "serial");
        assert_eq!(f.engine.calls(), vec![Call::LoadVoice(0)]);
    }

    #[test]
    fn test_voice_dump_request_broadcasts() {
        let f = fixture(MidiConfig::default());
        let rx_serial = f.router.registry().register("serial").unwrap();
        let rx_usb = f.router.registry().register("umidi1").unwrap();
        f.router
            .slots()
            .set_assignment(0, ChannelAssignment::Channel(0));

        let sysex = SysExMessage::new(vec![0xF0, 0x43, 0x20, 0x00, 0xF7]).unwrap();
        f.router.dispatch(Message::SysEx(sysex), "serial");

        let frame = rx_serial.try_recv().unwrap();
        assert_eq!(frame.len(), sysex::VOICE_BULK_FRAME_LEN);
        assert_eq!(rx_usb.try_recv().unwrap(), frame);
    }

    #[test]
    fn test_thru_mirror_forwards_bytes() {
        let mut config = MidiConfig::default();
        config.thru_in = "serial".into();
        config.thru_out = "umidi1".into();
        let f = fixture(config);
        let rx = f.router.registry().register("umidi1").unwrap();

        f.router.dispatch(note_on(1, 0x3C, 0x40), "serial");
        assert_eq!(rx.try_recv().unwrap(), vec![0x91, 0x3C, 0x40]);

        // Traffic from other transports is not mirrored.
        f.router.dispatch(note_on(1, 0x3C, 0x40), "udp");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_system_cc_override_stops_dispatch() {
        let mut config = MidiConfig::default();
        config.system_cc_volume = 1;
        let f = fixture(config);
        // Slot 0 listens on channel 0; CC 17 maps to volume of slot 1.
        f.router
            .slots()
            .set_assignment(0, ChannelAssignment::Channel(0));

        f.router.dispatch(
            Message::Channel {
                channel: 0,
                msg: ChannelMessage::ControlChange {
                    controller: 17,
                    value: 100,
                },
            },
            "serial",
        );
        // Only the override fires, never the per-slot CC path.
        assert_eq!(f.engine.calls(), vec![Call::Volume(100, 1)]);
    }

    #[test]
    fn test_cc_scaling() {
        let f = fixture(MidiConfig::default());
        f.router
            .slots()
            .set_assignment(0, ChannelAssignment::Channel(0));

        f.router.dispatch(
            Message::Channel {
                channel: 0,
                msg: ChannelMessage::ControlChange {
                    controller: cc::FREQUENCY_CUTOFF,
                    value: 127,
                },
            },
            "serial",
        );
        f.router.dispatch(
            Message::Channel {
                channel: 0,
                msg: ChannelMessage::ControlChange {
                    controller: cc::DETUNE_LEVEL,
                    value: 0,
                },
            },
            "serial",
        );
        f.router.dispatch(
            Message::Channel {
                channel: 0,
                msg: ChannelMessage::ControlChange {
                    controller: cc::DETUNE_LEVEL,
                    value: 127,
                },
            },
            "serial",
        );
        assert_eq!(
            f.engine.calls(),
            vec![
                Call::Cutoff(99, 0),
                Call::MasterTune(0, 0),
                Call::MasterTune(99, 0),
            ]
        );
    }

    #[test]
    fn test_performance_select_first_responder() {
        let mut config = MidiConfig::default();
        config.performance_select_channel = ChannelAssignment::Channel(9);
        let f = fixture(config);
        f.router
            .slots()
            .set_assignment(0, ChannelAssignment::Channel(9));

        f.router.dispatch(
            Message::Channel {
                channel: 9,
                msg: ChannelMessage::ProgramChange { program: 7 },
            },
            "serial",
        );
        // Selected once; no per-slot program change happened.
        assert_eq!(f.store.selected.lock().as_slice(), &[7]);
        assert!(f.engine.calls().is_empty());
    }

    #[test]
    fn test_program_change_gate() {
        let mut config = MidiConfig::default();
        config.rx_program_change = false;
        let f = fixture(config);
        f.router
            .slots()
            .set_assignment(0, ChannelAssignment::Channel(0));

        f.router.dispatch(
            Message::Channel {
                channel: 0,
                msg: ChannelMessage::ProgramChange { program: 3 },
            },
            "serial",
        );
        assert!(f.engine.calls().is_empty());
    }

    #[test]
    fn test_scale_detune_range() {
        assert_eq!(scale_detune(1), -99);
        assert_eq!(scale_detune(127), 99);
        assert!(scale_detune(64).abs() < 2);
    }
}
