use bitflags::bitflags;

bitflags! {
    /// Readiness as the client library expresses it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HandleEvents: i32 {
        const READABLE = 1 << 0;
        const WRITABLE = 1 << 1;
        const ERROR = 1 << 2;
        const HANGUP = 1 << 3;
    }
}

bitflags! {
    /// Readiness as poll(2) reports it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PollEvents: libc::c_short {
        const IN = libc::POLLIN;
        const OUT = libc::POLLOUT;
        const ERR = libc::POLLERR;
        const HUP = libc::POLLHUP;
        /// Output only; never translated.
        const NVAL = libc::POLLNVAL;
    }
}

const MAPPING: [(HandleEvents, PollEvents); 4] = [
    (HandleEvents::READABLE, PollEvents::IN),
    (HandleEvents::WRITABLE, PollEvents::OUT),
    (HandleEvents::ERROR, PollEvents::ERR),
    (HandleEvents::HANGUP, PollEvents::HUP),
];

pub fn to_poll_events(events: HandleEvents) -> PollEvents {
    MAPPING
        .iter()
        .filter(|(handle, _)| events.contains(*handle))
        .fold(PollEvents::empty(), |acc, (_, poll)| acc | *poll)
}

pub fn from_poll_events(events: PollEvents) -> HandleEvents {
    MAPPING
        .iter()
        .filter(|(_, poll)| events.contains(*poll))
        .fold(HandleEvents::empty(), |acc, (handle, _)| acc | *handle)
}
