//! Ready-made hooks for [`Twi::perform_with`](crate::Twi::perform_with)

/// Sleep until something happens, then return.
///
/// On Cortex-M this is `wfe`: every exception return sets the event register,
/// so a completion interrupt that fired between the last poll and this call
/// still wakes the core immediately. Elsewhere it is a spin-loop hint.
#[inline]
pub fn wait_for_event() {
    #[cfg(target_arch = "arm")]
    cortex_m::asm::wfe();

    #[cfg(not(target_arch = "arm"))]
    core::hint::spin_loop();
}
