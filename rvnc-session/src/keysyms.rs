//! The fixed X11 keysym table for non-character keys.
//!
//! The host maps its native virtual-key codes to [`Key`] values (or raw
//! keysyms); this module supplies the X11 numbers servers actually
//! interpret. These constants are protocol data, not style — a wrong value
//! here types the wrong key on the remote desktop.

#![allow(non_upper_case_globals)]

pub const XK_BackSpace: u32 = 0xff08;
pub const XK_Tab: u32 = 0xff09;
pub const XK_Return: u32 = 0xff0d;
pub const XK_Escape: u32 = 0xff1b;
pub const XK_Insert: u32 = 0xff63;
pub const XK_Delete: u32 = 0xffff;
pub const XK_Home: u32 = 0xff50;
pub const XK_End: u32 = 0xff57;
pub const XK_Page_Up: u32 = 0xff55;
pub const XK_Page_Down: u32 = 0xff56;
pub const XK_Left: u32 = 0xff51;
pub const XK_Up: u32 = 0xff52;
pub const XK_Right: u32 = 0xff53;
pub const XK_Down: u32 = 0xff54;
pub const XK_F1: u32 = 0xffbe;
pub const XK_F2: u32 = 0xffbf;
pub const XK_F3: u32 = 0xffc0;
pub const XK_F4: u32 = 0xffc1;
pub const XK_F5: u32 = 0xffc2;
pub const XK_F6: u32 = 0xffc3;
pub const XK_F7: u32 = 0xffc4;
pub const XK_F8: u32 = 0xffc5;
pub const XK_F9: u32 = 0xffc6;
pub const XK_F10: u32 = 0xffc7;
pub const XK_F11: u32 = 0xffc8;
pub const XK_F12: u32 = 0xffc9;
pub const XK_Shift_L: u32 = 0xffe1;
pub const XK_Shift_R: u32 = 0xffe2;
pub const XK_Control_L: u32 = 0xffe3;
pub const XK_Control_R: u32 = 0xffe4;
pub const XK_Alt_L: u32 = 0xffe9;
pub const XK_Alt_R: u32 = 0xffea;
pub const XK_Super_L: u32 = 0xffeb;
pub const XK_Super_R: u32 = 0xffec;
pub const XK_Menu: u32 = 0xff67;
pub const XK_Num_Lock: u32 = 0xff7f;
pub const XK_Caps_Lock: u32 = 0xffe5;
pub const XK_Scroll_Lock: u32 = 0xff14;
pub const XK_Print: u32 = 0xff61;

/// A platform-neutral key the host can hand to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// A printable character; Latin-1 code points are their own keysym.
    Char(char),
    Return,
    Escape,
    BackSpace,
    Tab,
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    Left,
    Up,
    Right,
    Down,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    ShiftLeft,
    ShiftRight,
    ControlLeft,
    ControlRight,
    AltLeft,
    AltRight,
    SuperLeft,
    SuperRight,
    Menu,
    NumLock,
    CapsLock,
    ScrollLock,
    Print,
}

/// The X11 keysym sent in a KeyEvent for this key.
pub fn keysym(key: Key) -> u32 {
    match key {
        Key::Char(c) => c as u32,
        Key::Return => XK_Return,
        Key::Escape => XK_Escape,
        Key::BackSpace => XK_BackSpace,
        Key::Tab => XK_Tab,
        Key::Insert => XK_Insert,
        Key::Delete => XK_Delete,
        Key::Home => XK_Home,
        Key::End => XK_End,
        Key::PageUp => XK_Page_Up,
        Key::PageDown => XK_Page_Down,
        Key::Left => XK_Left,
        Key::Up => XK_Up,
        Key::Right => XK_Right,
        Key::Down => XK_Down,
        Key::F1 => XK_F1,
        Key::F2 => XK_F2,
        Key::F3 => XK_F3,
        Key::F4 => XK_F4,
        Key::F5 => XK_F5,
        Key::F6 => XK_F6,
        Key::F7 => XK_F7,
        Key::F8 => XK_F8,
        Key::F9 => XK_F9,
        Key::F10 => XK_F10,
        Key::F11 => XK_F11,
        Key::F12 => XK_F12,
        Key::ShiftLeft => XK_Shift_L,
        Key::ShiftRight => XK_Shift_R,
        Key::ControlLeft => XK_Control_L,
        Key::ControlRight => XK_Control_R,
        Key::AltLeft => XK_Alt_L,
        Key::AltRight => XK_Alt_R,
        Key::SuperLeft => XK_Super_L,
        Key::SuperRight => XK_Super_R,
        Key::Menu => XK_Menu,
        Key::NumLock => XK_Num_Lock,
        Key::CapsLock => XK_Caps_Lock,
        Key::ScrollLock => XK_Scroll_Lock,
        Key::Print => XK_Print,
    }
}
