//! Main application state and event loop.

use std::collections::HashSet;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::Terminal;
use ratatui::prelude::*;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use ganttview_core::api::{GridDataSource, TaskInstanceQuery, TaskInstanceSource};
use ganttview_core::datetime::ISO_FORMAT_WITHOUT_TZ;
use ganttview_core::filters::{DEBOUNCE_DELAY, Debounced, FetchFilters, FilterState, Filters};
use ganttview_core::layout::{
    GanttLayout, LayoutGuard, RowData, RowItemData, SELECT_RUN_MESSAGE, flatten_visible,
    host_rows, selection_to_row_data,
};
use ganttview_core::models::{GridData, Selection};
use ganttview_core::scroll::{ScrollPane, ScrollSync};
use ganttview_core::{CoreResult, DisplayTimezone};

use crate::error::TuiResult;
use crate::event::{
    InputEvent, is_down, is_enter, is_escape, is_left, is_page_down, is_page_up, is_quit,
    is_refresh, is_right, is_tab, is_up, poll_input, typed_char,
};
use crate::navigation::TreeState;
use crate::ui;

/// Shift applied by `[` and `]`.
const SMALL_SHIFT_HOURS: i64 = 2;
/// Shift applied by `{` and `}`.
const LARGE_SHIFT_HOURS: i64 = 8;

/// Which chart is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    /// Task instances of every dag, one row per worker host.
    #[default]
    Cluster,
    /// One dag run, one row per task or task group.
    Dag,
}

/// Startup settings for [`App`].
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Initial filter query string, e.g. `time_range=2h&num_runs=25`.
    pub query: String,
    pub timezone: DisplayTimezone,
    pub auto_refresh: Option<Duration>,
    /// Open the dag view for this dag right away.
    pub dag_id: Option<String>,
    pub run_id: Option<String>,
}

/// The dag view's data and selection.
#[derive(Debug, Clone)]
pub struct DagView {
    dag_id: String,
    grid: Option<GridData>,
    error: Option<String>,
    selection: Selection,
    tree_state: TreeState,
}

impl DagView {
    fn new(dag_id: String, selection: Selection) -> Self {
        Self {
            dag_id,
            grid: None,
            error: None,
            selection,
            tree_state: TreeState::new(),
        }
    }

    pub fn dag_id(&self) -> &str {
        &self.dag_id
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn grid(&self) -> Option<&GridData> {
        self.grid.as_ref()
    }

    /// Select the next (newer) or previous run; with none selected, pick the newest.
    fn cycle_run(&mut self, forward: bool) {
        let Some(grid) = &self.grid else {
            return;
        };
        if grid.dag_runs.is_empty() {
            return;
        }
        let last = grid.dag_runs.len() - 1;
        let current = self
            .selection
            .run_id
            .as_deref()
            .and_then(|id| grid.dag_runs.iter().position(|run| run.run_id == id));
        let index = match current {
            Some(i) if forward => (i + 1).min(last),
            Some(i) => i.saturating_sub(1),
            None => last,
        };
        let run_id = grid.dag_runs[index].run_id.clone();
        debug!(run_id = %run_id, "Selecting dag run");
        self.selection = Selection::run(run_id);
    }
}

/// Completed grid-data request.
struct GridLoaded {
    dag_id: String,
    result: CoreResult<GridData>,
}

/// Layout inputs that require recomputing pane dimensions when they change.
#[derive(Debug, Clone, PartialEq)]
struct LayoutKey {
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    rows: Vec<RowData>,
    open_group_ids: Vec<String>,
    area: Rect,
    alerts: usize,
}

/// Main application state.
pub struct App<S> {
    source: Arc<S>,
    /// Query-parameter backed filters.
    filter_state: FilterState,
    /// Fetch filters after the debounce delay.
    debounced: Debounced<FetchFilters>,
    query: TaskInstanceQuery<S>,
    view: View,
    dag: Option<DagView>,
    grid_tx: mpsc::UnboundedSender<GridLoaded>,
    grid_rx: mpsc::UnboundedReceiver<GridLoaded>,
    grid_in_flight: usize,
    /// Cursor position in the visible rows.
    selected_row: usize,
    /// Cursor position within the selected row's items.
    selected_item: usize,
    grid_pane: ScrollPane,
    timeline_pane: ScrollPane,
    sync: ScrollSync,
    layout_guard: LayoutGuard<LayoutKey>,
    /// Chart rows that fit on screen.
    viewport_rows: usize,
    dismissed_warnings: HashSet<String>,
    /// End-date text being typed, if editing.
    input: Option<String>,
    running: bool,
}

impl<S: TaskInstanceSource + GridDataSource + 'static> App<S> {
    /// Create the application and start the first fetch.
    ///
    /// Must be called inside a tokio runtime: fetches run on spawned tasks.
    pub fn new(source: Arc<S>, options: AppOptions) -> Self {
        let filter_state =
            FilterState::from_query_string(&options.query, Utc::now(), options.timezone);
        let fetch_filters = filter_state.filters().fetch_filters();

        let mut query = TaskInstanceQuery::new(Arc::clone(&source));
        if let Some(interval) = options.auto_refresh {
            info!(interval_secs = interval.as_secs(), "Auto-refresh enabled");
            query = query.with_auto_refresh(interval);
        }
        query.set_filters(&fetch_filters);

        let (grid_tx, grid_rx) = mpsc::unbounded_channel();
        let mut app = Self {
            source,
            filter_state,
            debounced: Debounced::new(fetch_filters, DEBOUNCE_DELAY),
            query,
            view: View::default(),
            dag: None,
            grid_tx,
            grid_rx,
            grid_in_flight: 0,
            selected_row: 0,
            selected_item: 0,
            grid_pane: ScrollPane::default(),
            timeline_pane: ScrollPane::default(),
            sync: ScrollSync::new(),
            layout_guard: LayoutGuard::new(),
            viewport_rows: 0,
            dismissed_warnings: HashSet::new(),
            input: None,
            running: true,
        };

        if let Some(dag_id) = options.dag_id {
            let selection = Selection {
                run_id: options.run_id,
                task_id: None,
            };
            app.open_dag(dag_id, selection);
        }
        app
    }

    /// Check if the application is still running.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Request the application to quit.
    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn view(&self) -> View {
        self.view
    }

    /// The dag view state, once a dag was opened.
    pub fn dag(&self) -> Option<&DagView> {
        self.dag.as_ref()
    }

    pub fn timezone(&self) -> DisplayTimezone {
        self.filter_state.timezone()
    }

    /// The filters as currently edited (not yet debounced).
    pub fn filters(&self) -> Filters {
        self.filter_state.filters()
    }

    pub fn filter_state(&self) -> &FilterState {
        &self.filter_state
    }

    /// The filters the current fetch is keyed on.
    pub fn fetch_filters(&self) -> &FetchFilters {
        self.debounced.value()
    }

    pub fn selected_row(&self) -> usize {
        self.selected_row
    }

    pub fn selected_item(&self) -> usize {
        self.selected_item
    }

    pub fn grid_offset(&self) -> usize {
        self.grid_pane.offset()
    }

    pub fn timeline_offset(&self) -> usize {
        self.timeline_pane.offset()
    }

    /// The end-date text being typed, if editing.
    pub fn input(&self) -> Option<&str> {
        self.input.as_deref()
    }

    /// Title of the current view.
    pub fn view_title(&self) -> String {
        match (self.view, &self.dag) {
            (View::Dag, Some(dag)) => match &dag.selection.run_id {
                Some(run_id) => format!("Gantt: {} / {}", dag.dag_id, run_id),
                None => format!("Gantt: {}", dag.dag_id),
            },
            _ => "Cluster activity".to_string(),
        }
    }

    /// Whether the loading indicator should show.
    pub fn is_loading(&self) -> bool {
        let state = self.query.state();
        let dag_loading = self.view == View::Dag && self.grid_in_flight > 0;
        state.is_loading || state.is_previous_data || self.debounced.is_pending() || dag_loading
    }

    /// Backend warnings that were not dismissed.
    pub fn visible_warnings(&self) -> Vec<String> {
        if self.view != View::Cluster {
            return Vec::new();
        }
        self.query
            .state()
            .data
            .map(|data| {
                data.warnings
                    .iter()
                    .filter(|w| !self.dismissed_warnings.contains(*w))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Text shown instead of the chart, if the chart cannot be drawn.
    pub fn chart_message(&self) -> Option<String> {
        match self.view {
            View::Cluster => {
                let state = self.query.state();
                if let Some(error) = &state.error {
                    return Some(format!("Error fetching task instances {}", error));
                }
                match state.data {
                    None if state.is_loading => Some("Loading task instances...".to_string()),
                    None => Some("Error fetching task instances unknown error".to_string()),
                    Some(data) if data.tis.is_empty() => {
                        Some("No task instances in this window".to_string())
                    }
                    Some(_) => None,
                }
            }
            View::Dag => {
                let dag = self.dag.as_ref()?;
                if let Some(error) = &dag.error {
                    return Some(format!("Error fetching grid data {}", error));
                }
                if dag.grid.is_none() {
                    return Some("Loading grid data...".to_string());
                }
                if dag.selection.run_id.is_none() {
                    return Some(SELECT_RUN_MESSAGE.to_string());
                }
                None
            }
        }
    }

    /// Rows and window for the current view, derived fresh from the data.
    pub fn gantt_layout(&self) -> GanttLayout {
        match self.view {
            View::Cluster => {
                let window = self.debounced.value();
                let rows = self
                    .query
                    .state()
                    .data
                    .map(|data| host_rows(&data.tis))
                    .unwrap_or_default();
                GanttLayout {
                    start_date: Some(window.start_date),
                    end_date: Some(window.end_date),
                    rows,
                }
            }
            View::Dag => match &self.dag {
                Some(dag) if dag.selection.run_id.is_some() => match &dag.grid {
                    Some(grid) => selection_to_row_data(
                        &grid.groups,
                        &grid.dag_runs,
                        &dag.selection,
                        dag.tree_state.expanded_ids(),
                    ),
                    None => empty_layout(),
                },
                _ => empty_layout(),
            },
        }
    }

    /// The item under the cursor.
    pub fn cursor_item(&self) -> Option<RowItemData> {
        let layout = self.gantt_layout();
        let visible = flatten_visible(&layout.rows);
        visible
            .get(self.selected_row)
            .and_then(|v| v.row.items.get(self.selected_item))
            .cloned()
    }

    fn open_group_ids(&self) -> Vec<String> {
        match (&self.view, &self.dag) {
            (View::Dag, Some(dag)) => dag.tree_state.sorted_ids(),
            _ => Vec::new(),
        }
    }

    /// Recompute pane dimensions if the layout inputs or the screen changed.
    pub fn sync_layout(&mut self, area: Rect) {
        let layout = self.gantt_layout();
        let alerts = self.visible_warnings().len();
        let key = LayoutKey {
            start_date: layout.start_date,
            end_date: layout.end_date,
            rows: layout.rows,
            open_group_ids: self.open_group_ids(),
            area,
            alerts,
        };
        let row_count = flatten_visible(&key.rows).len();
        if !self.layout_guard.changed(key) {
            return;
        }

        self.viewport_rows = ui::chart_viewport_rows(area, alerts);
        let max_offset = row_count.saturating_sub(self.viewport_rows);
        debug!(
            rows = row_count,
            viewport = self.viewport_rows,
            max_offset,
            "Layout changed"
        );
        self.grid_pane.set_max_offset(max_offset);
        self.timeline_pane.set_max_offset(max_offset);
        self.selected_row = self.selected_row.min(row_count.saturating_sub(1));
        self.clamp_item();
    }

    /// Apply finished fetches, settle debounced filters and run the scroll re-check.
    ///
    /// Returns true if anything visible changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = self.query.poll();

        while let Ok(loaded) = self.grid_rx.try_recv() {
            self.apply_grid(loaded);
            changed = true;
        }

        if self.debounced.poll(now) {
            debug!("Filters settled");
            self.query.set_filters(self.debounced.value());
            changed = true;
        }

        changed |= self.sync.tick(&self.grid_pane, &mut self.timeline_pane, now);
        changed
    }

    /// Wait for outstanding fetches and apply them.
    pub async fn settle(&mut self) {
        self.query.settle().await;
        while self.grid_in_flight > 0 {
            match self.grid_rx.recv().await {
                Some(loaded) => self.apply_grid(loaded),
                None => break,
            }
        }
    }

    fn apply_grid(&mut self, loaded: GridLoaded) {
        let GridLoaded { dag_id, result } = loaded;
        self.grid_in_flight = self.grid_in_flight.saturating_sub(1);

        let Some(dag) = self.dag.as_mut().filter(|d| d.dag_id == dag_id) else {
            debug!(dag_id = %dag_id, "Dropping grid data for a closed dag");
            return;
        };
        match result {
            Ok(grid) => {
                dag.grid = Some(grid);
                dag.error = None;
            }
            Err(e) => {
                warn!(dag_id = %dag_id, error = %e, "Grid data fetch failed");
                dag.error = Some(e.to_string());
            }
        }
    }

    fn spawn_grid_fetch(&mut self, dag_id: String) {
        let num_runs = self.filter_state.filters().num_runs;
        let source = Arc::clone(&self.source);
        let tx = self.grid_tx.clone();
        self.grid_in_flight += 1;
        debug!(dag_id = %dag_id, num_runs, "Fetching grid data");

        tokio::spawn(async move {
            let result = source.fetch_grid_data(&dag_id, num_runs).await;
            // The receiver only goes away with the app.
            let _ = tx.send(GridLoaded { dag_id, result });
        });
    }

    /// Switch to the dag view for `dag_id`, keeping its state if already open.
    pub fn open_dag(&mut self, dag_id: String, selection: Selection) {
        info!(dag_id = %dag_id, "Opening dag view");
        match &mut self.dag {
            Some(dag) if dag.dag_id == dag_id => dag.selection = selection,
            _ => {
                self.dag = Some(DagView::new(dag_id.clone(), selection));
                self.spawn_grid_fetch(dag_id);
            }
        }
        self.set_view(View::Dag);
    }

    fn set_view(&mut self, view: View) {
        if self.view == view {
            return;
        }
        self.view = view;
        self.selected_row = 0;
        self.selected_item = 0;
        self.scroll_grid_to(0, Instant::now());
    }

    /// Feed the edited filters into the debouncer.
    fn filters_changed(&mut self, now: Instant) {
        let next = self.filter_state.filters().fetch_filters();
        debug!(query = %self.filter_state.to_query_string(), "Filters edited");
        self.debounced.update(next, now);
    }

    fn refresh(&mut self) {
        info!("Manual refresh");
        self.query.refetch();
        if let Some(dag_id) = self.dag.as_ref().map(|d| d.dag_id.clone())
            && self.view == View::Dag
        {
            self.spawn_grid_fetch(dag_id);
        }
    }

    fn visible_row_count(&self) -> usize {
        flatten_visible(&self.gantt_layout().rows).len()
    }

    fn clamp_item(&mut self) {
        let layout = self.gantt_layout();
        let visible = flatten_visible(&layout.rows);
        let items = visible
            .get(self.selected_row)
            .map_or(0, |v| v.row.items.len());
        self.selected_item = self.selected_item.min(items.saturating_sub(1));
    }

    fn scroll_grid_to(&mut self, offset: usize, now: Instant) {
        self.grid_pane.scroll_to(offset);
        self.sync
            .on_grid_scroll(&self.grid_pane, &mut self.timeline_pane, now);
    }

    /// Scroll so the cursor row is inside the viewport.
    fn ensure_row_visible(&mut self, now: Instant) {
        let offset = self.grid_pane.offset();
        let target = if self.selected_row < offset {
            self.selected_row
        } else if self.viewport_rows > 0 && self.selected_row >= offset + self.viewport_rows {
            self.selected_row + 1 - self.viewport_rows
        } else {
            return;
        };
        self.scroll_grid_to(target, now);
    }

    /// Move the row cursor by `delta`, clamping at both ends.
    fn move_row(&mut self, delta: isize, now: Instant) {
        let count = self.visible_row_count();
        if count == 0 {
            return;
        }
        self.selected_row = self
            .selected_row
            .saturating_add_signed(delta)
            .min(count - 1);
        self.clamp_item();
        self.ensure_row_visible(now);
    }

    fn move_item(&mut self, forward: bool) {
        if forward {
            self.selected_item += 1;
        } else {
            self.selected_item = self.selected_item.saturating_sub(1);
        }
        self.clamp_item();
    }

    fn page(&mut self, forward: bool, now: Instant) {
        let step = self.viewport_rows.max(1) as isize;
        let delta = if forward { step } else { -step };
        let offset = self.grid_pane.offset().saturating_add_signed(delta);
        self.scroll_grid_to(offset, now);
        self.move_row(delta, now);
    }

    /// Enter: toggle a group, select a task, or follow an item's link.
    fn activate(&mut self) {
        let layout = self.gantt_layout();
        let visible = flatten_visible(&layout.rows);
        let Some(current) = visible.get(self.selected_row) else {
            return;
        };
        let row = current.row;

        match self.view {
            View::Cluster => {
                let Some(link) = row.items.get(self.selected_item).and_then(|i| i.link.clone())
                else {
                    return;
                };
                let selection = Selection::run(link.run_id).with_task(link.task_id);
                self.open_dag(link.dag_id, selection);
            }
            View::Dag => {
                let Some(dag) = self.dag.as_mut() else {
                    return;
                };
                if row.has_children() {
                    dag.tree_state.toggle(&row.id);
                } else {
                    dag.selection.task_id = Some(row.id.clone());
                }
            }
        }
    }

    fn dismiss_warnings(&mut self) {
        let warnings = self.visible_warnings();
        debug!(count = warnings.len(), "Dismissing warnings");
        self.dismissed_warnings.extend(warnings);
    }

    fn start_input(&mut self) {
        let end = self.filter_state.filters().end_date;
        self.input = Some(self.timezone().format(end, ISO_FORMAT_WITHOUT_TZ));
    }

    fn handle_input_key(&mut self, key: &KeyEvent, now: Instant) {
        if is_escape(key) {
            self.input = None;
        } else if is_enter(key) {
            if let Some(value) = self.input.take() {
                self.filter_state.on_base_date_change(&value);
                self.filters_changed(now);
            }
        } else if key.code == KeyCode::Backspace {
            if let Some(input) = &mut self.input {
                input.pop();
            }
        } else if let Some(c) = typed_char(key)
            && let Some(input) = &mut self.input
        {
            input.push(c);
        }
    }

    /// Handle a keyboard event.
    pub fn handle_key(&mut self, key: &KeyEvent, now: Instant) {
        if self.input.is_some() {
            self.handle_input_key(key, now);
            return;
        }

        if is_quit(key) {
            self.quit();
            return;
        }

        if is_tab(key) {
            match self.view {
                View::Cluster if self.dag.is_some() => self.set_view(View::Dag),
                View::Dag => self.set_view(View::Cluster),
                View::Cluster => {}
            }
            return;
        }

        if is_escape(key) {
            self.set_view(View::Cluster);
        } else if is_down(key) {
            self.move_row(1, now);
        } else if is_up(key) {
            self.move_row(-1, now);
        } else if is_left(key) {
            self.move_item(false);
        } else if is_right(key) {
            self.move_item(true);
        } else if is_page_down(key) {
            self.page(true, now);
        } else if is_page_up(key) {
            self.page(false, now);
        } else if is_enter(key) {
            self.activate();
        } else if is_refresh(key) {
            self.refresh();
        } else if let Some(c) = typed_char(key) {
            self.handle_char(c, now);
        }
    }

    fn handle_char(&mut self, c: char, now: Instant) {
        let hours = chrono::Duration::hours;
        match c {
            '[' => self.filter_state.shift_base_date(hours(-SMALL_SHIFT_HOURS)),
            ']' => self.filter_state.shift_base_date(hours(SMALL_SHIFT_HOURS)),
            '{' => self.filter_state.shift_base_date(hours(-LARGE_SHIFT_HOURS)),
            '}' => self.filter_state.shift_base_date(hours(LARGE_SHIFT_HOURS)),
            'n' => self.filter_state.reset_base_date(Utc::now()),
            'r' => self.filter_state.cycle_num_runs(true),
            'R' => self.filter_state.cycle_num_runs(false),
            't' => self.filter_state.cycle_time_range(true),
            'T' => self.filter_state.cycle_time_range(false),
            'b' => {
                self.start_input();
                return;
            }
            'x' => {
                self.dismiss_warnings();
                return;
            }
            'c' => {
                if let Some(dag) = self.dag.as_mut()
                    && self.view == View::Dag
                {
                    dag.tree_state.collapse_all();
                }
                return;
            }
            ',' | '.' => {
                if let Some(dag) = self.dag.as_mut()
                    && self.view == View::Dag
                {
                    dag.cycle_run(c == '.');
                }
                self.clamp_item();
                return;
            }
            _ => return,
        }
        self.filters_changed(now);
    }

    /// Run the main application loop.
    ///
    /// This initializes the terminal, runs the event loop, and ensures
    /// the terminal is restored on exit (even on panic).
    pub fn run(&mut self) -> TuiResult<()> {
        let mut terminal = init_terminal()?;

        let _guard = scopeguard::guard((), |()| {
            let _ = restore_terminal();
        });

        let result = self.event_loop(&mut terminal);

        drop(_guard);

        result
    }

    /// The main event loop.
    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> TuiResult<()> {
        while self.running {
            let size = terminal.size()?;
            self.sync_layout(Rect::new(0, 0, size.width, size.height));

            terminal.draw(|frame| ui::draw(frame, self))?;

            match poll_input(Duration::from_millis(100))? {
                Some(InputEvent::Key(key)) => self.handle_key(&key, Instant::now()),
                Some(InputEvent::Resize(cols, rows)) => {
                    debug!(cols, rows, "Terminal resized");
                    self.layout_guard.invalidate();
                }
                None => {}
            }

            self.tick(Instant::now());
        }
        Ok(())
    }
}

fn empty_layout() -> GanttLayout {
    GanttLayout {
        start_date: None,
        end_date: None,
        rows: Vec::new(),
    }
}

/// Initialize the terminal for TUI rendering.
fn init_terminal() -> TuiResult<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore the terminal to its original state.
fn restore_terminal() -> TuiResult<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}
