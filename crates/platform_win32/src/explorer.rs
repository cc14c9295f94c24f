//! Explorer automation through the Shell windows collection.
//!
//! COM interfaces here are apartment-bound: create a [`ComApartment`] on the
//! calling thread first and drop every [`ShellWindow`] before leaving it.

use crate::api_error;
use std::ffi::c_void;
use tracing::debug;
use windows::core::{Interface, HSTRING};
use windows::Win32::Foundation::PROPERTYKEY;
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoTaskMemFree, CoUninitialize, IServiceProvider,
    CLSCTX_ALL, COINIT_APARTMENTTHREADED,
};
use windows::Win32::System::Variant::VARIANT;
use windows::Win32::UI::Shell::PropertiesSystem::PSGetPropertyKeyFromName;
use windows::Win32::UI::Shell::{
    IFolderView2, IPersistFolder2, IShellBrowser, IShellView, IShellWindows, IWebBrowser2,
    SHGetNameFromIDList, ShellWindows, SID_STopLevelBrowser, SIGDN_DESKTOPABSOLUTEPARSING,
    SORTCOLUMN, SORT_ASCENDING, SORT_DESCENDING,
};
use wintoolbox_core::explorer::NO_GROUPING_PROPERTY;
use wintoolbox_core::{
    BrowserAutomation, BrowserWindow, GroupBy, PlatformError, ViewMode, WindowHandle,
};

/// Single-threaded COM apartment for the current thread.
pub struct ComApartment {
    initialized: bool,
}

impl ComApartment {
    pub fn enter() -> Self {
        let hr = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
        if hr.is_err() {
            // Already initialized with another model; COM is still usable
            debug!("CoInitializeEx returned {:?}", hr);
        }
        Self {
            initialized: hr.is_ok(),
        }
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        if self.initialized {
            unsafe { CoUninitialize() };
        }
    }
}

/// Enumerates open Explorer windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellAutomation;

impl BrowserAutomation for ShellAutomation {
    type Window = ShellWindow;

    fn browser_windows(&self) -> Result<Vec<ShellWindow>, PlatformError> {
        let shell_windows: IShellWindows =
            unsafe { CoCreateInstance(&ShellWindows, None, CLSCTX_ALL) }
                .map_err(|e| api_error("CoCreateInstance(ShellWindows)", e))?;
        let count = unsafe { shell_windows.Count() }.map_err(|e| api_error("IShellWindows::Count", e))?;

        let mut windows = Vec::new();
        for index in 0..count {
            match ShellWindow::from_item(&shell_windows, index) {
                Ok(Some(window)) => windows.push(window),
                Ok(None) => {}
                Err(e) => debug!("Skipping shell window {}: {}", index, e),
            }
        }
        Ok(windows)
    }
}

/// One Explorer window with an active folder view.
pub struct ShellWindow {
    handle: WindowHandle,
    view: IShellView,
    folder_view: IFolderView2,
}

impl ShellWindow {
    /// Resolve entry `index` of the collection. Returns `None` for shell
    /// windows that are not Explorer (e.g. Internet Explorer).
    fn from_item(shell_windows: &IShellWindows, index: i32) -> Result<Option<Self>, PlatformError> {
        let dispatch = unsafe { shell_windows.Item(&VARIANT::from(index)) }
            .map_err(|e| api_error("IShellWindows::Item", e))?;
        let browser: IWebBrowser2 = dispatch
            .cast()
            .map_err(|e| api_error("QueryInterface(IWebBrowser2)", e))?;

        let name = unsafe { browser.Name() }.map_err(|e| api_error("IWebBrowser2::Name", e))?;
        if !name.to_string().to_lowercase().contains("explorer") {
            return Ok(None);
        }
        let hwnd = unsafe { browser.HWND() }.map_err(|e| api_error("IWebBrowser2::HWND", e))?;

        let provider: IServiceProvider = browser
            .cast()
            .map_err(|e| api_error("QueryInterface(IServiceProvider)", e))?;
        let shell_browser: IShellBrowser = unsafe { provider.QueryService(&SID_STopLevelBrowser) }
            .map_err(|e| api_error("QueryService(STopLevelBrowser)", e))?;
        let view = unsafe { shell_browser.QueryActiveShellView() }
            .map_err(|e| api_error("QueryActiveShellView", e))?;
        let folder_view: IFolderView2 = view
            .cast()
            .map_err(|e| api_error("QueryInterface(IFolderView2)", e))?;

        Ok(Some(Self {
            handle: WindowHandle(hwnd.0 as u64),
            view,
            folder_view,
        }))
    }
}

impl BrowserWindow for ShellWindow {
    fn handle(&self) -> WindowHandle {
        self.handle
    }

    fn folder_path(&self) -> Result<String, PlatformError> {
        let folder: IPersistFolder2 = unsafe { self.folder_view.GetFolder() }
            .map_err(|e| api_error("IFolderView::GetFolder", e))?;
        let pidl = unsafe { folder.GetCurFolder() }.map_err(|e| api_error("GetCurFolder", e))?;

        let name = unsafe { SHGetNameFromIDList(pidl, SIGDN_DESKTOPABSOLUTEPARSING) };
        unsafe { CoTaskMemFree(Some(pidl as *const c_void)) };
        let name = name.map_err(|e| api_error("SHGetNameFromIDList", e))?;

        let path = unsafe { name.to_string() }
            .map_err(|e| PlatformError::call("SHGetNameFromIDList", e.to_string()));
        unsafe { CoTaskMemFree(Some(name.0 as *const c_void)) };
        path
    }

    fn view_mode(&self) -> Result<ViewMode, PlatformError> {
        let mode = unsafe { self.folder_view.GetCurrentViewMode() }
            .map_err(|e| api_error("GetCurrentViewMode", e))?;
        Ok(ViewMode(mode))
    }

    fn set_view_mode(&self, mode: ViewMode) -> Result<(), PlatformError> {
        unsafe { self.folder_view.SetCurrentViewMode(mode.0) }
            .map_err(|e| api_error("SetCurrentViewMode", e))
    }

    fn set_group_by(&self, group: &GroupBy) -> Result<(), PlatformError> {
        let key = match group {
            // System.Null is the all-zero key
            GroupBy::None => PROPERTYKEY::default(),
            GroupBy::Column(name) => property_key(name)?,
        };
        unsafe { self.folder_view.SetGroupBy(&key, true) }.map_err(|_| {
            let name = match group {
                GroupBy::None => NO_GROUPING_PROPERTY,
                GroupBy::Column(name) => name.as_str(),
            };
            PlatformError::PropertyRejected(name.to_string())
        })
    }

    fn set_sort(&self, column: &str, ascending: bool) -> Result<(), PlatformError> {
        let sort = SORTCOLUMN {
            propkey: property_key(column)?,
            direction: if ascending { SORT_ASCENDING } else { SORT_DESCENDING },
        };
        unsafe { self.folder_view.SetSortColumns(&[sort]) }
            .map_err(|_| PlatformError::PropertyRejected(column.to_string()))
    }

    fn refresh(&self) -> Result<(), PlatformError> {
        unsafe { self.view.Refresh() }.map_err(|e| api_error("IShellView::Refresh", e))
    }
}

/// Resolve a canonical property name such as `System.ItemNameDisplay`.
fn property_key(name: &str) -> Result<PROPERTYKEY, PlatformError> {
    let mut key = PROPERTYKEY::default();
    unsafe { PSGetPropertyKeyFromName(&HSTRING::from(name), &mut key) }
        .map_err(|_| PlatformError::PropertyRejected(name.to_string()))?;
    Ok(key)
}
