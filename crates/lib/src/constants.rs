//! Constants used throughout the BookIt library.
//!
//! Central definitions for collection names, scalar names, field names and
//! reserved event keys.

/// Collection of resource categories.
pub const CATEGORIES: &str = "categories";

/// Collection of resources.
pub const ITEMS: &str = "items";

/// Collection of checklist categories.
pub const CHECKLIST_CATEGORIES: &str = "checklistcategories";

/// Collection of checklist entries.
pub const CHECKLIST_ITEMS: &str = "checklistitems";

/// Scalar holding the active filters (filter name -> value).
pub const ACTIVE_FILTERS: &str = "activeFilters";

/// Scalar holding the selected room id.
pub const ACTIVE_ROOM: &str = "activeRoom";

/// Scalar holding the selected role id.
pub const ACTIVE_ROLE: &str = "activeRole";

/// Ordering field shared by every ordered entity.
pub const SORTORDER: &str = "sortorder";

/// Foreign key from items to their category.
pub const CATEGORY_ID: &str = "categoryid";

/// Event fired once after every committed write that changed anything.
pub const STATE_UPDATED: &str = "state:updated";

/// Moodle web-service endpoint, relative to the site root.
pub const AJAX_SERVICE_PATH: &str = "lib/ajax/service.php";
