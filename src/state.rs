#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SequencerState {
    Idle,                  // Nothing in flight, last content (if any) on screen
    ShowingCard(CardPhase), // Title card for the live transition
    ShowingContent,        // Content load requested, waiting for it to settle
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CardPhase {
    Loading, // Interstitial surface is loading
    Holding, // Card visible, duration timer running
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum QuitState {
    NotRequested, // No quit attempt pending
    Challenging,  // Password dialog open
    Granted,      // Termination allowed
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LinkStatus {
    Absent,     // No device handle, eligible for the next scan
    Connecting, // Open in flight
    Open,       // Decoding bytes
}
