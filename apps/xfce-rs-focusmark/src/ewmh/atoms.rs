x11rb::atom_manager! {
    /// Atoms interned once per session.
    pub AtomCollection: AtomCollectionCookie {
        _NET_ACTIVE_WINDOW,
        _NET_CLIENT_LIST,
        _NET_WM_NAME,
        UTF8_STRING,
        // Private message type used to wake the event loop for shutdown.
        FOCUSMARK_SHUTDOWN: b"_XFCE_RS_FOCUSMARK_SHUTDOWN",
    }
}
