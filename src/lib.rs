pub mod bridge;
pub mod commands;
pub mod config;
pub mod dialog;
pub mod events;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod scheduler;
pub mod state;
pub mod storage;
pub mod view;

#[cfg(all(feature = "app", not(test)))]
use tauri::Manager;

#[cfg(all(feature = "app", not(test)))]
use crate::bridge::{persist_through, Bridge};
#[cfg(all(feature = "app", not(test)))]
use crate::commands::*;
#[cfg(all(feature = "app", not(test)))]
use crate::config::load_settings;
#[cfg(all(feature = "app", not(test)))]
use crate::logging::init_logging;
#[cfg(all(feature = "app", not(test)))]
use crate::scheduler::BannerTimer;
#[cfg(all(feature = "app", not(test)))]
use crate::state::AppState;
#[cfg(all(feature = "app", not(test)))]
use crate::storage::FileStore;

#[cfg_attr(mobile, tauri::mobile_entry_point)]
#[cfg(all(feature = "app", not(test)))]
pub fn run() {
    tauri::Builder::default()
        .setup(|app| {
            let root = app.path().app_data_dir()?;
            init_logging(&root)?;

            let settings = load_settings(&root);
            let store = FileStore::in_dir(&root, &settings.store_file);
            store.ensure_dirs()?;
            let bridge = Bridge::spawn(store, settings.data_key.clone())?;

            let state = AppState::new();
            persist_through(&state, &bridge);
            tauri::async_runtime::block_on(state.load_initial(&bridge));
            log::info!(
                "app started groups={} store={}",
                state.groups().len(),
                settings.store_file
            );

            app.manage(settings);
            app.manage(BannerTimer::default());
            app.manage(bridge);
            app.manage(state);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            load_state,
            add_group,
            delete_group,
            select_group,
            add_task,
            toggle_task,
            edit_task,
            delete_task,
            reorder_tasks,
            set_filter,
            set_sort,
            open_add_dialog,
            open_edit_dialog,
            update_dialog,
            cancel_dialog,
            submit_dialog,
            load_data,
            save_data,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
