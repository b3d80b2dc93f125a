//! Per-frame state advance

use crate::gesture::GestureController;

/// Auto-rotation driver, one `advance` per rendered frame
#[derive(Debug, Clone)]
pub struct FrameLoop {
    auto_rotate: bool,
    yaw_step: f32,
    mounted: bool,
    frames: u64,
}

impl FrameLoop {
    pub fn new(auto_rotate: bool, yaw_step: f32) -> Self {
        Self {
            auto_rotate,
            yaw_step,
            mounted: true,
            frames: 0,
        }
    }

    pub fn auto_rotate(&self) -> bool {
        self.auto_rotate
    }

    pub fn set_auto_rotate(&mut self, enabled: bool) {
        self.auto_rotate = enabled;
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Advance one frame; returns true when the yaw changed
    ///
    /// No-op once unmounted.
    pub fn advance(&mut self, controller: &mut GestureController, model_present: bool) -> bool {
        if !self.mounted {
            return false;
        }
        self.frames += 1;

        if self.auto_rotate && model_present && !controller.is_active() {
            controller.advance_yaw(self.yaw_step);
            return true;
        }
        false
    }

    /// Stop the loop for good
    pub fn unmount(&mut self) {
        self.mounted = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::TouchPoint;

    #[test]
    fn test_auto_rotate_advances_yaw() {
        let mut controller = GestureController::default();
        let mut frame_loop = FrameLoop::new(true, 0.005);

        for _ in 0..10 {
            assert!(frame_loop.advance(&mut controller, true));
        }
        assert!((controller.state().yaw() - 0.05).abs() < 1e-6);
        assert_eq!(frame_loop.frames(), 10);
    }

    #[test]
    fn test_no_rotation_without_model_or_during_gesture() {
        let mut controller = GestureController::default();
        let mut frame_loop = FrameLoop::new(true, 0.005);

        assert!(!frame_loop.advance(&mut controller, false));

        controller.touch_start(&[TouchPoint::new(0.0, 0.0)]);
        assert!(!frame_loop.advance(&mut controller, true));
        controller.touch_end(&[]);
        assert!(frame_loop.advance(&mut controller, true));

        frame_loop.set_auto_rotate(false);
        assert!(!frame_loop.advance(&mut controller, true));
        assert!((controller.state().yaw() - 0.005).abs() < 1e-6);
    }

    #[test]
    fn test_unmount_stops_mutation() {
        let mut controller = GestureController::default();
        let mut frame_loop = FrameLoop::new(true, 0.005);
        frame_loop.unmount();

        assert!(!frame_loop.advance(&mut controller, true));
        assert_eq!(controller.state().yaw(), 0.0);
        assert_eq!(frame_loop.frames(), 0);
        assert!(!frame_loop.is_mounted());
    }
}
