//! # DEVONthink 3
//!
//! Facades for the document and database manager. Register them with
//! `register` before opening a session:
//!
//! ```ignore
//! let registry = devonthink::register(ClassRegistry::builder()).build();
//! let session = Session::builder(channel).registry(registry).build();
//! let app = DevonThink::open(&session)?;
//! ```
//!
//! Collections come back as `ArrayProxy`s; scalar properties are read by
//! calling the property specifier. Sheet cell coordinates are the
//! application's own 1-based indices and are passed through unchanged.

use chrono::DateTime;
use chrono::Utc;

use crate::array::ArrayProxy;
use crate::class_map::ClassRegistryBuilder;
use crate::error::Result;
use crate::facade::Application;
use crate::facade::Facade;
use crate::proxy::ObjectProxy;
use crate::session::Session;
use crate::value::FromValue;
use crate::value::Kwargs;
use crate::value::Value;
use crate::value::kwargs;

/// Name the application is scripted under.
pub const APP_NAME: &str = "DEVONthink 3";

/// Element class names the application reports for records reached through
/// a relation rather than by their own class.
const RECORD_ALIASES: [&str; 5] = ["content", "parent", "child", "selectedRecord", "record"];

/// Adds the DEVONthink class mappings to `builder`.
pub fn register(builder: ClassRegistryBuilder) -> ClassRegistryBuilder {
    let builder = RECORD_ALIASES
        .iter()
        .fold(builder, |builder, class| builder.register_facade::<Record>(APP_NAME, class));
    builder
        .register_facade::<DevonThink>(APP_NAME, "application")
        .register_facade::<Database>(APP_NAME, "database")
        .register_facade::<Item>(APP_NAME, "item")
        .register_facade::<SmartGroup>(APP_NAME, "smartGroup")
        .register_facade::<Reminder>(APP_NAME, "reminder")
        .register_facade::<Text>(APP_NAME, "text")
        .register_facade::<Tab>(APP_NAME, "tab")
        .register_facade::<Window>(APP_NAME, "thinkWindow")
        .register_facade::<Window>(APP_NAME, "documentWindow")
        .register_facade::<Window>(APP_NAME, "viewerWindow")
}

fn read<T: FromValue>(proxy: &ObjectProxy, name: &str) -> Result<T> {
    proxy.invoke(name, Vec::new(), Kwargs::new())
}

crate::define_facade! {
    /// The application object.
    pub struct DevonThink = "devonthink.application";
}

/// Options for `DevonThink::search`. Unset options are left to the
/// application's defaults.
#[derive(Clone, Debug, Default)]
pub struct SearchOptions {
    /// `"fuzzy"`, `"no case"` or `"no umlauts"`.
    pub comparison: Option<String>,
    pub exclude_subgroups: Option<bool>,
    /// Group to search in; all databases when absent.
    pub in_group: Option<Record>,
}

impl DevonThink {
    pub fn open(session: &Session) -> Result<Self> {
        session.get_application(APP_NAME).map(Self::from_proxy)
    }

    /// The generic application view of the same object.
    pub fn application(&self) -> Application {
        self.proxy.cast()
    }

    pub fn databases(&self) -> Result<ArrayProxy> {
        self.proxy.get("databases")
    }

    pub fn current_database(&self) -> Result<Database> {
        self.proxy.get("currentDatabase")
    }

    pub fn inbox(&self) -> Result<Database> {
        self.proxy.get("inbox")
    }

    pub fn selected_records(&self) -> Result<ArrayProxy> {
        self.proxy.get("selectedRecords")
    }

    /// Whether the user cancelled the visible progress indicator.
    pub fn cancelled_progress(&self) -> Result<bool> {
        read(&self.proxy, "cancelledProgress")
    }

    pub fn set_cancelled_progress(&self, cancelled: bool) -> Result<()> {
        self.proxy.set_property("cancelledProgress", cancelled)
    }

    /// Looks up a record by UUID, optionally within one database.
    pub fn get_record_with_uuid(&self, uuid: &str, database: Option<&Database>) -> Result<Option<Record>> {
        self.proxy.invoke(
            "getRecordWithUuid",
            vec![uuid.into()],
            kwargs([("in", database.map(Value::from))]),
        )
    }

    pub fn get_database_with_uuid(&self, uuid: &str) -> Result<Option<Database>> {
        self.proxy.invoke("getDatabaseWithUuid", vec![uuid.into()], Kwargs::new())
    }

    pub fn search(&self, text: &str, options: &SearchOptions) -> Result<Vec<Record>> {
        self.proxy.invoke(
            "search",
            vec![text.into()],
            kwargs([
                ("comparison", options.comparison.clone().map(Value::from)),
                ("excludeSubgroups", options.exclude_subgroups.map(Value::from)),
                ("in", options.in_group.as_ref().map(Value::from)),
            ]),
        )
    }

    /// Creates a record from a property dictionary, in `group` or the
    /// incoming group.
    pub fn create_record_with(&self, properties: Kwargs, group: Option<&Record>) -> Result<Record> {
        self.proxy.invoke(
            "createRecordWith",
            vec![Value::Dict(properties)],
            kwargs([("in", group.map(Value::from))]),
        )
    }

    /// Reads one cell of a sheet. `column` and `row` are 1-based.
    pub fn get_cell_at(&self, sheet: &Record, column: i64, row: i64) -> Result<String> {
        self.proxy.invoke(
            "getCellAt",
            vec![sheet.into()],
            kwargs([("column", Some(column.into())), ("row", Some(row.into()))]),
        )
    }

    /// Writes one cell of a sheet. `column` and `row` are 1-based.
    pub fn set_cell_at(&self, sheet: &Record, column: i64, row: i64, content: &str) -> Result<bool> {
        self.proxy.invoke(
            "setCellAt",
            vec![sheet.into()],
            kwargs([
                ("column", Some(column.into())),
                ("row", Some(row.into())),
                ("to", Some(content.into())),
            ]),
        )
    }

    /// The first open database called `name`.
    pub fn database_by_name(&self, name: &str) -> Result<Option<Database>> {
        for item in &self.databases()? {
            let database: Database = item?.extract()?;
            if database.name()? == name {
                return Ok(Some(database));
            }
        }
        Ok(None)
    }
}

crate::define_facade! {
    /// One open database.
    pub struct Database = "devonthink.database";
}

impl Database {
    pub fn name(&self) -> Result<String> {
        read(&self.proxy, "name")
    }

    pub fn set_name(&self, name: &str) -> Result<()> {
        self.proxy.set_property("name", name)
    }

    pub fn uuid(&self) -> Result<String> {
        read(&self.proxy, "uuid")
    }

    /// File system path of the database package.
    pub fn path(&self) -> Result<String> {
        read(&self.proxy, "path")
    }

    pub fn read_only(&self) -> Result<bool> {
        read(&self.proxy, "readOnly")
    }

    /// The top level group.
    pub fn root(&self) -> Result<Record> {
        self.proxy.get("root")
    }

    pub fn contents(&self) -> Result<ArrayProxy> {
        self.proxy.get("contents")
    }

    pub fn records(&self) -> Result<ArrayProxy> {
        self.proxy.get("records")
    }
}

crate::define_facade! {
    /// A document, group or any other item of a database.
    pub struct Record = "devonthink.record";
}

impl Record {
    pub fn name(&self) -> Result<String> {
        read(&self.proxy, "name")
    }

    pub fn set_name(&self, name: &str) -> Result<()> {
        self.proxy.set_property("name", name)
    }

    pub fn uuid(&self) -> Result<String> {
        read(&self.proxy, "uuid")
    }

    /// The record type, e.g. `"markdown"` or `"group"`.
    pub fn record_type(&self) -> Result<String> {
        read(&self.proxy, "type")
    }

    pub fn tags(&self) -> Result<Vec<String>> {
        read(&self.proxy, "tags")
    }

    pub fn set_tags(&self, tags: &[&str]) -> Result<()> {
        let tags: Vec<Value> = tags.iter().map(|t| Value::from(*t)).collect();
        self.proxy.set_property("tags", tags)
    }

    pub fn addition_date(&self) -> Result<DateTime<Utc>> {
        read(&self.proxy, "additionDate")
    }

    pub fn modification_date(&self) -> Result<DateTime<Utc>> {
        read(&self.proxy, "modificationDate")
    }

    pub fn plain_text(&self) -> Result<String> {
        read(&self.proxy, "plainText")
    }

    /// Group path of the record inside its database.
    pub fn location(&self) -> Result<String> {
        read(&self.proxy, "location")
    }

    pub fn database(&self) -> Result<Database> {
        self.proxy.get("database")
    }

    pub fn children(&self) -> Result<ArrayProxy> {
        self.proxy.get("children")
    }

    pub fn parents(&self) -> Result<ArrayProxy> {
        self.proxy.get("parents")
    }
}

crate::define_facade! {
    /// Rich text. The object is callable; calling it yields the plain content.
    pub struct Text = "devonthink.text";
}

impl Text {
    pub fn content(&self) -> Result<String> {
        self.proxy.call_self(Vec::new(), Kwargs::new())?.extract()
    }

    pub fn font(&self) -> Result<String> {
        self.proxy.get("font")
    }

    pub fn size(&self) -> Result<i64> {
        self.proxy.get("size")
    }

    pub fn paragraphs(&self) -> Result<ArrayProxy> {
        self.proxy.get("paragraphs")
    }
}

crate::define_facade! {
    /// The abstract base of everything in a database.
    pub struct Item = "devonthink.item";
}

impl Item {
    /// The record view of the same object.
    pub fn record(&self) -> Record {
        self.proxy.cast()
    }
}

crate::define_facade! {
    /// A group whose contents are the results of a stored search.
    pub struct SmartGroup = "devonthink.smartGroup";
}

impl SmartGroup {
    /// The record view of the same object; a smart group is a record.
    pub fn record(&self) -> Record {
        self.proxy.cast()
    }

    pub fn exclude_subgroups(&self) -> Result<bool> {
        read(&self.proxy, "excludeSubgroups")
    }

    pub fn set_exclude_subgroups(&self, exclude: bool) -> Result<()> {
        self.proxy.set_property("excludeSubgroups", exclude)
    }

    pub fn highlight_occurrences(&self) -> Result<bool> {
        read(&self.proxy, "highlightOccurrences")
    }

    /// The group the search runs in.
    pub fn search_group(&self) -> Result<Record> {
        self.proxy.get("searchGroup")
    }

    pub fn set_search_group(&self, group: &Record) -> Result<()> {
        self.proxy.set_property("searchGroup", group)
    }

    pub fn search_predicates(&self) -> Result<String> {
        read(&self.proxy, "searchPredicates")
    }

    pub fn set_search_predicates(&self, predicates: &str) -> Result<()> {
        self.proxy.set_property("searchPredicates", predicates)
    }
}

crate::define_facade! {
    /// A reminder attached to a record.
    pub struct Reminder = "devonthink.reminder";
}

impl Reminder {
    /// What happens when the reminder fires, e.g. `"notification"`.
    pub fn alarm(&self) -> Result<String> {
        read(&self.proxy, "alarm")
    }

    pub fn set_alarm(&self, alarm: &str) -> Result<()> {
        self.proxy.set_property("alarm", alarm)
    }

    pub fn due_date(&self) -> Result<DateTime<Utc>> {
        read(&self.proxy, "dueDate")
    }

    pub fn set_due_date(&self, due: DateTime<Utc>) -> Result<()> {
        self.proxy.set_property("dueDate", due)
    }

    pub fn interval(&self) -> Result<i64> {
        read(&self.proxy, "interval")
    }

    /// `"once"`, `"daily"`, `"weekly"` and so on.
    pub fn schedule(&self) -> Result<String> {
        read(&self.proxy, "schedule")
    }

    pub fn set_schedule(&self, schedule: &str) -> Result<()> {
        self.proxy.set_property("schedule", schedule)
    }
}

crate::define_facade! {
    /// One tab of a think window.
    pub struct Tab = "devonthink.tab";
}

impl Tab {
    /// The record shown in the tab, if any.
    pub fn content_record(&self) -> Result<Option<Record>> {
        self.proxy.get("contentRecord")
    }

    pub fn database(&self) -> Result<Database> {
        self.proxy.get("database")
    }

    pub fn current_page(&self) -> Result<i64> {
        read(&self.proxy, "currentPage")
    }

    pub fn loading(&self) -> Result<bool> {
        read(&self.proxy, "loading")
    }

    pub fn reference_url(&self) -> Result<String> {
        read(&self.proxy, "referenceURL")
    }
}

crate::define_facade! {
    /// A think, document or viewer window.
    pub struct Window = "devonthink.window";
}

impl Window {
    /// The record shown in the current tab, if any.
    pub fn content_record(&self) -> Result<Option<Record>> {
        self.proxy.get("contentRecord")
    }

    pub fn database(&self) -> Result<Database> {
        self.proxy.get("database")
    }

    pub fn current_tab(&self) -> Result<Tab> {
        self.proxy.get("currentTab")
    }

    pub fn tabs(&self) -> Result<ArrayProxy> {
        self.proxy.get("tabs")
    }

    pub fn selected_records(&self) -> Result<ArrayProxy> {
        self.proxy.get("selectedRecords")
    }

    pub fn loading(&self) -> Result<bool> {
        read(&self.proxy, "loading")
    }
}
