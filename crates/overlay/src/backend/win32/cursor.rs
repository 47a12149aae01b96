use egui::CursorIcon;
use windows::{
    Win32::UI::WindowsAndMessaging::{
        HCURSOR, IDC_APPSTARTING, IDC_ARROW, IDC_CROSS, IDC_HAND, IDC_HELP, IDC_IBEAM, IDC_NO,
        IDC_SIZEALL, IDC_SIZENESW, IDC_SIZENS, IDC_SIZENWSE, IDC_SIZEWE, IDC_WAIT, LoadCursorW,
    },
    core::PCWSTR,
};

/// Load the system cursor closest to `icon`.
///
/// Returns `None` for [`CursorIcon::None`], hiding the cursor.
pub fn load_cursor(icon: CursorIcon) -> Option<HCURSOR> {
    #[inline]
    fn system_cursor(res: PCWSTR) -> Option<HCURSOR> {
        unsafe { LoadCursorW(None, res) }.ok()
    }

    match icon {
        CursorIcon::None => None,
        CursorIcon::Help => system_cursor(IDC_HELP),
        CursorIcon::PointingHand => system_cursor(IDC_HAND),
        CursorIcon::Progress => system_cursor(IDC_APPSTARTING),
        CursorIcon::Wait => system_cursor(IDC_WAIT),
        CursorIcon::Crosshair | CursorIcon::Cell => system_cursor(IDC_CROSS),
        CursorIcon::Text | CursorIcon::VerticalText => system_cursor(IDC_IBEAM),
        CursorIcon::Move | CursorIcon::AllScroll | CursorIcon::Grab | CursorIcon::Grabbing => {
            system_cursor(IDC_SIZEALL)
        }
        CursorIcon::NoDrop | CursorIcon::NotAllowed => system_cursor(IDC_NO),
        CursorIcon::ResizeHorizontal
        | CursorIcon::ResizeEast
        | CursorIcon::ResizeWest
        | CursorIcon::ResizeColumn => system_cursor(IDC_SIZEWE),
        CursorIcon::ResizeVertical
        | CursorIcon::ResizeNorth
        | CursorIcon::ResizeSouth
        | CursorIcon::ResizeRow => system_cursor(IDC_SIZENS),
        CursorIcon::ResizeNeSw | CursorIcon::ResizeNorthEast | CursorIcon::ResizeSouthWest => {
            system_cursor(IDC_SIZENESW)
        }
        CursorIcon::ResizeNwSe | CursorIcon::ResizeNorthWest | CursorIcon::ResizeSouthEast => {
            system_cursor(IDC_SIZENWSE)
        }
        _ => system_cursor(IDC_ARROW),
    }
}
