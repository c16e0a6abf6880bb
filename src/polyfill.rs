cfg_if! {
    if #[cfg(feature = "std")] {
        /// Whether the current thread is unwinding.
        #[inline(always)]
        pub(crate) fn panicking() -> bool {
            std::thread::panicking()
        }
    } else {
        /// Without `std` unwinding cannot be observed.
        #[inline(always)]
        pub(crate) fn panicking() -> bool {
            false
        }
    }
}
