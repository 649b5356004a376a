//! Normally-closed limit switch on a pulled-up GPIO input.
//!
//! The switch shorts the pin to ground while at rest, so a high level means the
//! switch has opened: the carriage is touching it.

use embedded_hal::digital::InputPin;
use tracing::debug;

/// Change in the switch state seen by [`LimitSwitch::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Low to high: contact made.
    Rising,
    /// High to low: contact released.
    Falling,
}

type Callback = Box<dyn FnMut(bool) + Send>;

pub struct LimitSwitch<P> {
    pin: P,
    last_level: Option<bool>,
    on_rising: Option<Callback>,
}

impl<P: InputPin> LimitSwitch<P> {
    /// Wraps a pin the HAL has already configured as an input with pull-up.
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            last_level: None,
            on_rising: None,
        }
    }

    /// Registers a callback run on every rising edge with the contacted state.
    pub fn on_rising_edge<F>(&mut self, callback: F)
    where
        F: FnMut(bool) + Send + 'static,
    {
        self.on_rising = Some(Box::new(callback));
    }

    /// Raw pin level.
    pub fn is_high(&mut self) -> Result<bool, P::Error> {
        self.pin.is_high()
    }

    pub fn contacted(&mut self) -> Result<bool, P::Error> {
        self.is_high()
    }

    /// Samples the pin and reports an edge against the previous sample.
    ///
    /// The first call only records the level. A rising edge runs the callback
    /// registered with [`on_rising_edge`](Self::on_rising_edge).
    pub fn poll(&mut self) -> Result<Option<Edge>, P::Error> {
        let level = self.pin.is_high()?;
        let edge = match self.last_level.replace(level) {
            Some(false) if level => Some(Edge::Rising),
            Some(true) if !level => Some(Edge::Falling),
            _ => None,
        };
        if edge == Some(Edge::Rising) {
            debug!("Limit switch contacted");
            if let Some(callback) = self.on_rising.as_mut() {
                callback(level);
            }
        }
        Ok(edge)
    }

    pub fn release(self) -> P {
        self.pin
    }
}
