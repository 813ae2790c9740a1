use rppal::gpio::{Gpio, InputPin, OutputPin};

use pantrack_traits::{BoxError, Direction, Level, LimitSwitches, StepperDriver, SwitchId, SwitchLevel};

use crate::error::{HwError, Result};

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

/// Step/direction driver (A4988/DRV8825/TB6600 style) on two GPIO outputs.
pub struct GpioStepper {
    step: OutputPin,
    dir: OutputPin,
    enable: Option<OutputPin>,
}

impl GpioStepper {
    /// `enable_pin` is driven low (active) for the lifetime of the stepper.
    pub fn try_new(step_pin: u8, dir_pin: u8, enable_pin: Option<u8>) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let mut step = gpio.get(step_pin).map_err(gpio_err)?.into_output();
        let dir = gpio.get(dir_pin).map_err(gpio_err)?.into_output();
        step.set_low();
        let enable = match enable_pin {
            Some(p) => {
                let mut en = gpio.get(p).map_err(gpio_err)?.into_output();
                en.set_low();
                Some(en)
            }
            None => None,
        };
        tracing::info!(step_pin, dir_pin, ?enable_pin, "stepper lines ready");
        Ok(Self { step, dir, enable })
    }
}

impl StepperDriver for GpioStepper {
    fn set_direction(&mut self, direction: Direction) -> std::result::Result<(), BoxError> {
        match direction {
            Direction::Right => self.dir.set_high(),
            Direction::Left => self.dir.set_low(),
        }
        Ok(())
    }

    fn set_step(&mut self, level: Level) -> std::result::Result<(), BoxError> {
        match level {
            Level::High => self.step.set_high(),
            Level::Low => self.step.set_low(),
        }
        Ok(())
    }
}

impl Drop for GpioStepper {
    fn drop(&mut self) {
        self.step.set_low();
        if let Some(en) = self.enable.as_mut() {
            en.set_high();
        }
    }
}

/// Two limit switches on pulled-up inputs.
pub struct GpioLimitSwitches {
    left: InputPin,
    right: InputPin,
    active_low: bool,
}

impl GpioLimitSwitches {
    pub fn try_new(left_pin: u8, right_pin: u8, active_low: bool) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let left = gpio.get(left_pin).map_err(gpio_err)?.into_input_pullup();
        let right = gpio.get(right_pin).map_err(gpio_err)?.into_input_pullup();
        tracing::info!(left_pin, right_pin, active_low, "limit switches ready");
        Ok(Self {
            left,
            right,
            active_low,
        })
    }
}

impl LimitSwitches for GpioLimitSwitches {
    fn read_switch(&mut self, id: SwitchId) -> std::result::Result<SwitchLevel, BoxError> {
        let pin = match id {
            SwitchId::Left => &self.left,
            SwitchId::Right => &self.right,
        };
        let pressed = if self.active_low {
            pin.is_low()
        } else {
            pin.is_high()
        };
        Ok(if pressed {
            SwitchLevel::Pressed
        } else {
            SwitchLevel::Released
        })
    }
}
