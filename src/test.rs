// SPDX-License-Identifier: MPL-2.0

//! Scenario tests over freshly formatted in-memory images.

use std::sync::Arc;

use crate::{
    bitmap::BitmapMut,
    checker::Fix,
    dir::{block_entries, DirEntryFileType, DirEntryWriter},
    format::FormatOptions,
    fs::{AllocPlan, Ext2},
    inode::{LOST_AND_FOUND_INO, ROOT_INO},
    prelude::*,
    utils::{TimeProvider, UnixTime},
};

const NOW: u32 = 1_700_000_000;

struct FixedClock;

impl TimeProvider for FixedClock {
    fn now(&self) -> UnixTime {
        UnixTime { sec: NOW }
    }
}

fn image(blocks_count: u32, inodes_count: u32) -> Ext2 {
    let mut ext2 = Ext2::format(FormatOptions {
        blocks_count,
        inodes_count,
    })
    .unwrap();
    ext2.set_time_provider(Arc::new(FixedClock));
    ext2
}

fn small_image() -> Ext2 {
    image(128, 32)
}

/// Free blocks and inodes of the superblock, then of the group.
fn counters(ext2: &Ext2) -> (u32, u32, u16, u16) {
    let sb = ext2.super_block();
    let gd = ext2.group_descriptor();
    (
        sb.free_blocks_count(),
        sb.free_inodes_count(),
        gd.free_blocks_count(),
        gd.free_inodes_count(),
    )
}

fn bitmaps(ext2: &Ext2) -> (String, String) {
    (
        ext2.block_bitmap().unwrap().to_bit_string(),
        ext2.inode_bitmap().unwrap().to_bit_string(),
    )
}

fn names(ext2: &Ext2, path: &str) -> Vec<String> {
    ext2.read_dir(path)
        .unwrap()
        .iter()
        .map(|entry| entry.name().into_owned())
        .collect()
}

fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn fresh_image_is_consistent() {
    let mut ext2 = small_image();
    assert_eq!(names(&ext2, "/"), vec![".", "..", "lost+found"]);
    assert_eq!(ext2.lookup("/lost+found").unwrap(), LOST_AND_FOUND_INO);
    assert_eq!(ext2.read_inode(LOST_AND_FOUND_INO).unwrap().hard_links(), 2);
    assert!(ext2.check().unwrap().is_clean());
}

#[test]
fn copy_of_3000_bytes_takes_three_direct_blocks() {
    let mut ext2 = image(8192, 8192);
    let (free_blocks, free_inodes, ..) = counters(&ext2);
    let data = content(3000);

    let ino = ext2.copy_in("/file", "file", &data).unwrap();
    let inode = ext2.read_inode(ino).unwrap();
    assert_eq!(inode.block_ptrs().directs().count(), 3);
    assert_eq!(inode.block_ptrs().indirect(), 0);
    assert_eq!(inode.file_size(), 3000);
    assert_eq!(inode.blocks_count(), 6);
    assert_eq!(ext2.super_block().free_blocks_count(), free_blocks - 3);
    assert_eq!(ext2.super_block().free_inodes_count(), free_inodes - 1);
    assert_eq!(ext2.read_file("/file").unwrap(), data);
}

#[test]
fn sector_count_follows_file_size() {
    let mut ext2 = image(1024, 64);
    for (len, sectors) in [(0, 0), (100, 1), (512, 1), (1000, 2), (13 * BLOCK_SIZE, 26)] {
        let name = format!("f{}", len);
        let ino = ext2.copy_in(&format!("/{}", name), &name, &content(len)).unwrap();
        let inode = ext2.read_inode(ino).unwrap();
        assert_eq!(inode.blocks_count(), sectors, "{} bytes", len);
        assert_eq!(inode.file_size(), len);
    }
    assert!(ext2.check().unwrap().is_clean());
}

#[test]
fn copy_into_directories() {
    let mut ext2 = small_image();
    ext2.mkdir("/d").unwrap();
    let data = content(10);

    ext2.copy_in("/d", "x.txt", &data).unwrap();
    ext2.copy_in("/", "y.txt", &data).unwrap();
    ext2.copy_in("/d/z.txt", "ignored", &data).unwrap();
    assert_eq!(ext2.read_file("/d/x.txt").unwrap(), data);
    assert_eq!(ext2.read_file("/y.txt").unwrap(), data);
    assert_eq!(names(&ext2, "/d"), vec![".", "..", "x.txt", "z.txt"]);

    assert!(matches!(
        ext2.copy_in("/d/x.txt", "x.txt", &data),
        Err(Ext2Error::AlreadyExists(_))
    ));
    assert!(matches!(
        ext2.copy_in("/missing/", "x.txt", &data),
        Err(Ext2Error::NotFound(_))
    ));
    assert!(matches!(
        ext2.copy_in("/missing/x.txt", "x.txt", &data),
        Err(Ext2Error::NotFound(_))
    ));
    assert!(matches!(
        ext2.copy_in("relative", "x.txt", &data),
        Err(Ext2Error::InvalidPath(_))
    ));
    assert!(matches!(ext2.read_file("/d"), Err(Ext2Error::IsDirectory(_))));
    assert!(matches!(ext2.read_dir("/y.txt"), Err(Ext2Error::NotADirectory(_))));
    assert!(ext2.check().unwrap().is_clean());
}

#[test]
fn indirect_file_round_trip() {
    let mut ext2 = image(1024, 64);
    let before = counters(&ext2);
    let data = content(20 * BLOCK_SIZE + 100);

    let ino = ext2.copy_in("/big", "big", &data).unwrap();
    let inode = ext2.read_inode(ino).unwrap();
    assert_eq!(inode.block_ptrs().directs().count(), 12);
    assert_ne!(inode.block_ptrs().indirect(), 0);
    // The sectors of the content; the indirect block is not counted.
    assert_eq!(inode.blocks_count(), 41);
    assert_eq!(ext2.super_block().free_blocks_count(), before.0 - 22);
    assert_eq!(ext2.read_file("/big").unwrap(), data);

    ext2.unlink("/big").unwrap();
    assert_eq!(counters(&ext2), before);
    ext2.restore("/big").unwrap();
    assert_eq!(ext2.read_file("/big").unwrap(), data);
    assert_eq!(ext2.super_block().free_blocks_count(), before.0 - 22);
    assert!(ext2.check().unwrap().is_clean());
}

#[test]
fn too_large_file_is_refused() {
    let mut ext2 = image(1024, 64);
    let before = counters(&ext2);
    let data = content(269 * BLOCK_SIZE);
    assert!(matches!(
        ext2.copy_in("/huge", "huge", &data),
        Err(Ext2Error::FileTooLarge { .. })
    ));
    assert_eq!(counters(&ext2), before);
}

#[test]
fn failed_copy_releases_its_allocations() {
    let mut ext2 = small_image();
    let before = counters(&ext2);
    let maps = bitmaps(&ext2);
    // More blocks than the 103 left free.
    let data = content(110 * BLOCK_SIZE);

    assert!(matches!(
        ext2.copy_in("/big", "big", &data),
        Err(Ext2Error::NoSpace(_))
    ));
    assert_eq!(counters(&ext2), before);
    assert_eq!(bitmaps(&ext2), maps);
    assert_eq!(names(&ext2, "/"), vec![".", "..", "lost+found"]);
    assert!(ext2.check().unwrap().is_clean());
}

#[test]
fn inode_exhaustion() {
    let mut ext2 = small_image();
    // Inodes 12 to 32 are free.
    for i in 0..21 {
        ext2.mkdir(&format!("/d{}", i)).unwrap();
    }
    let before = counters(&ext2);
    let maps = bitmaps(&ext2);
    assert_eq!(before.1, 0);
    assert!(matches!(ext2.mkdir("/extra"), Err(Ext2Error::NoSpace(_))));
    assert_eq!(counters(&ext2), before);
    assert_eq!(bitmaps(&ext2), maps);
    assert_eq!(ext2.read_inode(ROOT_INO).unwrap().hard_links(), 3 + 21);
    assert_eq!(ext2.group_descriptor().dirs_count(), 2 + 21);
}

#[test]
fn allocation_round_trip() {
    let mut ext2 = small_image();
    let before = counters(&ext2);
    let dirs = ext2.group_descriptor().dirs_count();
    let mut plan = AllocPlan::default();

    let bid = ext2.alloc_block(&mut plan).unwrap();
    let ino = ext2.alloc_inode(true, &mut plan).unwrap();
    assert!(ext2.is_block_allocated(bid).unwrap());
    assert!(ext2.is_inode_allocated(ino).unwrap());
    assert_eq!(ext2.group_descriptor().dirs_count(), dirs + 1);

    ext2.free_block(bid).unwrap();
    ext2.free_inode(ino, true).unwrap();
    assert!(!ext2.is_block_allocated(bid).unwrap());
    assert!(!ext2.is_inode_allocated(ino).unwrap());
    assert_eq!(counters(&ext2), before);
    assert_eq!(ext2.group_descriptor().dirs_count(), dirs);
    ext2.sync_metadata().unwrap();
}

#[test]
fn mkdir_links_and_missing_removal() {
    let mut ext2 = small_image();
    let a = ext2.mkdir("/a").unwrap();
    let b = ext2.mkdir("/a/b").unwrap();
    assert_eq!(ext2.lookup("/a/b").unwrap(), b);
    assert_eq!(ext2.lookup("/a/b/..").unwrap(), a);
    assert_eq!(ext2.lookup("/a/./b/.").unwrap(), b);
    assert_eq!(ext2.read_inode(a).unwrap().hard_links(), 3);
    assert_eq!(ext2.read_inode(b).unwrap().hard_links(), 2);
    assert!(matches!(ext2.mkdir("/a/b"), Err(Ext2Error::AlreadyExists(_))));
    assert!(matches!(ext2.mkdir("/x/y"), Err(Ext2Error::NotFound(_))));
    assert!(matches!(ext2.mkdir("/"), Err(Ext2Error::InvalidPath(_))));

    let before = counters(&ext2);
    assert!(matches!(ext2.unlink("/a/c"), Err(Ext2Error::NotFound(_))));
    assert!(matches!(ext2.unlink("/a/b"), Err(Ext2Error::IsDirectory(_))));
    assert_eq!(counters(&ext2), before);
    assert!(ext2.check().unwrap().is_clean());
}

#[test]
fn unlink_then_restore_round_trip() {
    let mut ext2 = small_image();
    let data = content(5000);
    let ino = ext2.copy_in("/a.txt", "a.txt", &data).unwrap();
    let inode = ext2.read_inode(ino).unwrap();
    let with_file = counters(&ext2);

    ext2.unlink("/a.txt").unwrap();
    let tombstone = ext2.read_inode(ino).unwrap();
    assert!(!ext2.is_inode_allocated(ino).unwrap());
    assert_eq!(tombstone.dtime(), UnixTime { sec: NOW });
    assert_eq!(tombstone.hard_links(), 0);
    assert_eq!(tombstone.block_ptrs(), inode.block_ptrs());
    for (_, bid) in inode.block_ptrs().directs() {
        assert!(!ext2.is_block_allocated(bid).unwrap());
    }
    assert!(matches!(ext2.read_file("/a.txt"), Err(Ext2Error::NotFound(_))));
    assert_eq!(with_file.0 + 5, ext2.super_block().free_blocks_count());

    assert_eq!(ext2.restore("/a.txt").unwrap(), ino);
    let restored = ext2.read_inode(ino).unwrap();
    assert!(ext2.is_inode_allocated(ino).unwrap());
    assert!(restored.dtime().is_zero());
    assert_eq!(restored.hard_links(), 1);
    assert_eq!(restored.block_ptrs(), inode.block_ptrs());
    assert_eq!(ext2.read_file("/a.txt").unwrap(), data);
    assert_eq!(counters(&ext2), with_file);
    assert!(matches!(
        ext2.restore("/a.txt"),
        Err(Ext2Error::AlreadyExists(_))
    ));
    assert!(ext2.check().unwrap().is_clean());
}

#[test]
fn restore_keeps_later_entries_reachable() {
    let mut ext2 = small_image();
    ext2.copy_in("/a", "a", b"first").unwrap();
    ext2.copy_in("/b", "b", b"second").unwrap();
    ext2.unlink("/a").unwrap();
    ext2.restore("/a").unwrap();
    assert_eq!(names(&ext2, "/"), vec![".", "..", "lost+found", "a", "b"]);
    assert_eq!(ext2.read_file("/a").unwrap(), b"first");
    assert_eq!(ext2.read_file("/b").unwrap(), b"second");

    let root = ext2.read_inode(ROOT_INO).unwrap();
    let bid = root.block_ptrs().direct(0);
    let total: usize = block_entries(ext2.disk.block(bid).unwrap())
        .unwrap()
        .iter()
        .map(|(_, entry)| entry.record_len())
        .sum();
    assert_eq!(total, BLOCK_SIZE);
}

#[test]
fn restore_fails_once_blocks_are_reused() {
    let mut ext2 = small_image();
    ext2.mkdir("/d").unwrap();
    ext2.copy_in("/keep", "keep", b"keep").unwrap();
    ext2.copy_in("/a", "a", &content(3000)).unwrap();
    ext2.unlink("/a").unwrap();

    // The fifth long name no longer fits the first block of /d, which then
    // grows into the lowest free block: the first block of /a.
    for i in 0..5 {
        ext2.hard_link("/keep", &format!("/d/{:x<200}", i)).unwrap();
    }
    assert_eq!(ext2.read_inode(ext2.lookup("/d").unwrap()).unwrap().file_size(), 2 * BLOCK_SIZE);

    let before = counters(&ext2);
    let maps = bitmaps(&ext2);
    match ext2.restore("/a") {
        Err(Ext2Error::CannotRestore { reason, .. }) => {
            assert_eq!(reason, "its blocks were reused")
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(counters(&ext2), before);
    assert_eq!(bitmaps(&ext2), maps);
    assert!(matches!(ext2.read_file("/a"), Err(Ext2Error::NotFound(_))));
}

#[test]
fn restore_fails_once_the_entry_is_overwritten() {
    let mut ext2 = small_image();
    ext2.copy_in("/a", "a", &content(3000)).unwrap();
    ext2.unlink("/a").unwrap();
    ext2.copy_in("/b", "b", &content(3000)).unwrap();
    assert!(matches!(
        ext2.restore("/a"),
        Err(Ext2Error::CannotRestore { .. })
    ));
    assert!(matches!(
        ext2.restore("/never"),
        Err(Ext2Error::CannotRestore { .. })
    ));
    assert!(ext2.check().unwrap().is_clean());
}

#[test]
fn restore_in_either_removal_order() {
    let mut ext2 = small_image();
    ext2.copy_in("/x", "x", b"x").unwrap();
    ext2.copy_in("/y", "y", b"yy").unwrap();
    ext2.copy_in("/z", "z", b"zzz").unwrap();

    // "/y" ends up covering "/z", so "/z" sits right after the bytes of "/y".
    ext2.unlink("/z").unwrap();
    ext2.unlink("/y").unwrap();
    ext2.restore("/z").unwrap();
    ext2.restore("/y").unwrap();
    assert_eq!(names(&ext2, "/"), vec![".", "..", "lost+found", "x", "y", "z"]);
    assert_eq!(ext2.read_file("/y").unwrap(), b"yy");
    assert_eq!(ext2.read_file("/z").unwrap(), b"zzz");
    assert!(ext2.check().unwrap().is_clean());
}

#[test]
fn trailing_slash_names_no_file() {
    let mut ext2 = small_image();
    ext2.copy_in("/f", "f", b"data").unwrap();
    let before = counters(&ext2);

    assert!(matches!(ext2.unlink("/f/"), Err(Ext2Error::InvalidPath(_))));
    assert_eq!(ext2.read_file("/f").unwrap(), b"data");
    assert_eq!(counters(&ext2), before);

    ext2.unlink("/f").unwrap();
    assert!(matches!(ext2.restore("/f/"), Err(Ext2Error::InvalidPath(_))));
    ext2.restore("/f").unwrap();
    assert_eq!(ext2.read_file("/f").unwrap(), b"data");
}

#[test]
fn hard_links_share_the_inode() {
    let mut ext2 = small_image();
    ext2.mkdir("/d").unwrap();
    let ino = ext2.copy_in("/a", "a", b"shared").unwrap();
    let before = counters(&ext2);

    ext2.hard_link("/a", "/d/b").unwrap();
    assert_eq!(counters(&ext2), before);
    assert_eq!(ext2.lookup("/d/b").unwrap(), ino);
    assert_eq!(ext2.read_inode(ino).unwrap().hard_links(), 2);
    let entry = ext2
        .read_dir("/d")
        .unwrap()
        .into_iter()
        .find(|entry| entry.name() == "b")
        .unwrap();
    assert_eq!(entry.type_(), DirEntryFileType::File);

    assert!(matches!(ext2.hard_link("/d", "/e"), Err(Ext2Error::IsDirectory(_))));
    assert!(matches!(ext2.hard_link("/a", "/d/b"), Err(Ext2Error::AlreadyExists(_))));
    assert!(matches!(ext2.hard_link("/nope", "/c"), Err(Ext2Error::NotFound(_))));

    ext2.unlink("/a").unwrap();
    assert!(ext2.is_inode_allocated(ino).unwrap());
    assert_eq!(ext2.read_inode(ino).unwrap().hard_links(), 1);
    assert_eq!(ext2.read_file("/d/b").unwrap(), b"shared");
    ext2.unlink("/d/b").unwrap();
    assert!(!ext2.is_inode_allocated(ino).unwrap());
    assert!(ext2.check().unwrap().is_clean());
}

#[test]
fn symlink_stores_the_target_text() {
    let mut ext2 = small_image();
    ext2.copy_in("/a", "a", b"data").unwrap();
    let root_links = ext2.read_inode(ROOT_INO).unwrap().hard_links();
    let free_blocks = ext2.super_block().free_blocks_count();

    let ino = ext2.symlink("/not/resolved", "/s").unwrap();
    let inode = ext2.read_inode(ino).unwrap();
    assert_eq!(inode.hard_links(), 2);
    assert_eq!(inode.file_size(), "/not/resolved".len());
    assert_eq!(inode.block_ptrs().directs().count(), 1);
    assert_eq!(ext2.super_block().free_blocks_count(), free_blocks - 1);
    assert_eq!(ext2.read_inode(ROOT_INO).unwrap().hard_links(), root_links);
    assert_eq!(ext2.read_link("/s").unwrap(), "/not/resolved");
    let entry = ext2
        .read_dir("/")
        .unwrap()
        .into_iter()
        .find(|entry| entry.name() == "s")
        .unwrap();
    assert_eq!(entry.type_(), DirEntryFileType::Symlink);

    assert!(matches!(ext2.read_link("/a"), Err(Ext2Error::InvalidPath(_))));
    assert!(matches!(ext2.symlink("", "/t"), Err(Ext2Error::InvalidPath(_))));
    assert!(matches!(ext2.symlink("/a", "/s"), Err(Ext2Error::AlreadyExists(_))));
    assert!(ext2.check().unwrap().is_clean());

    // A symbolic link starts with two links, so one removal keeps it.
    ext2.unlink("/s").unwrap();
    let kept = ext2.read_inode(ino).unwrap();
    assert_eq!(kept.hard_links(), 1);
    assert!(kept.dtime().is_zero());
    assert!(ext2.is_inode_allocated(ino).unwrap());
    assert!(ext2.is_block_allocated(kept.block_ptrs().direct(0)).unwrap());
    assert_eq!(ext2.super_block().free_blocks_count(), free_blocks - 1);
    assert!(matches!(ext2.read_link("/s"), Err(Ext2Error::NotFound(_))));
    assert!(ext2.check().unwrap().is_clean());
}

#[test]
fn directory_blocks_keep_their_record_lengths() {
    let mut ext2 = image(1024, 64);
    let d = ext2.mkdir("/d").unwrap();
    for i in 0..40 {
        ext2.copy_in(&format!("/d/{:y<40}", i), "", b"").unwrap();
    }
    let dir = ext2.read_inode(d).unwrap();
    assert!(dir.block_ptrs().directs().count() > 1);
    assert_eq!(dir.file_size(), dir.block_ptrs().directs().count() * BLOCK_SIZE);
    for i in (0..40).step_by(3) {
        ext2.unlink(&format!("/d/{:y<40}", i)).unwrap();
    }

    let dir = ext2.read_inode(d).unwrap();
    for (_, bid) in dir.block_ptrs().directs() {
        let total: usize = block_entries(ext2.disk.block(bid).unwrap())
            .unwrap()
            .iter()
            .map(|(_, entry)| entry.record_len())
            .sum();
        assert_eq!(total, BLOCK_SIZE);
    }
    assert_eq!(ext2.read_dir("/d").unwrap().len(), 2 + 40 - 14);
    assert!(ext2.check().unwrap().is_clean());
}

#[test]
fn checker_is_clean_and_idempotent() {
    let mut ext2 = small_image();
    ext2.mkdir("/a").unwrap();
    ext2.copy_in("/a/f", "f", &content(4000)).unwrap();
    ext2.hard_link("/a/f", "/g").unwrap();
    ext2.symlink("/a/f", "/s").unwrap();
    ext2.copy_in("/gone", "gone", b"gone").unwrap();
    ext2.unlink("/gone").unwrap();

    let report = ext2.check().unwrap();
    assert!(report.is_clean());
    assert_eq!(report.total(), 0);
    assert_eq!(report.to_string(), "No file system inconsistencies detected!");
    assert!(ext2.check().unwrap().is_clean());
}

#[test]
fn checker_remarks_a_cleared_inode() {
    let mut ext2 = small_image();
    let ino = ext2.copy_in("/a", "a", b"data").unwrap();
    let before = counters(&ext2);
    let bid = ext2.group_descriptor().inode_bitmap_bid;
    let len = ext2.super_block().inode_bitmap_len();
    BitmapMut::new(ext2.disk.block_mut(bid).unwrap(), len)
        .clear(ino as usize - 1)
        .unwrap();

    let report = ext2.check().unwrap();
    assert_eq!(
        report.fixes(),
        &[
            Fix::FreeInodesCounter {
                superblock: Some(1),
                group: Some(1),
            },
            Fix::InodeNotInUse { ino },
        ]
    );
    assert_eq!(report.total(), 3);
    assert!(report
        .to_string()
        .ends_with("3 file system inconsistencies repaired!"));
    assert!(ext2.is_inode_allocated(ino).unwrap());
    assert_eq!(counters(&ext2), before);
    assert!(ext2.check().unwrap().is_clean());
}

#[test]
fn checker_repairs_entry_inode_and_blocks() {
    let mut ext2 = small_image();
    let ino = ext2.copy_in("/a", "a", &content(2000)).unwrap();
    let before = counters(&ext2);

    let root = ext2.read_inode(ROOT_INO).unwrap();
    let (entry_bid, offset, _) = ext2
        .dir_entries(&root)
        .unwrap()
        .into_iter()
        .find(|(_, _, entry)| entry.ino() == ino)
        .unwrap();
    DirEntryWriter::new(ext2.disk.block_mut(entry_bid).unwrap())
        .set_type_at(offset, DirEntryFileType::Symlink)
        .unwrap();
    let mut inode = ext2.read_inode(ino).unwrap();
    inode.set_dtime(UnixTime { sec: 5 });
    ext2.write_inode(&inode).unwrap();
    let first = inode.block_ptrs().direct(0);
    let bitmap_bid = ext2.group_descriptor().block_bitmap_bid;
    let len = ext2.super_block().block_bitmap_len();
    let idx = (first - ext2.super_block().first_data_block()) as usize;
    BitmapMut::new(ext2.disk.block_mut(bitmap_bid).unwrap(), len)
        .clear(idx)
        .unwrap();

    let report = ext2.check().unwrap();
    assert_eq!(
        report.fixes(),
        &[
            Fix::FreeBlocksCounter {
                superblock: Some(1),
                group: Some(1),
            },
            Fix::EntryType { ino },
            Fix::DeletionTime { ino },
            Fix::UnmarkedBlocks { ino, count: 1 },
        ]
    );
    assert_eq!(report.total(), 5);
    assert_eq!(counters(&ext2), before);
    assert!(ext2.read_inode(ino).unwrap().dtime().is_zero());
    assert!(ext2.is_block_allocated(first).unwrap());
    assert!(ext2.check().unwrap().is_clean());
}

#[test]
fn checker_repairs_drifted_counters() {
    let mut ext2 = small_image();
    let before = counters(&ext2);
    ext2.adjust_free_blocks(4);
    ext2.super_block.adjust_free_inodes(-2);

    let report = ext2.check().unwrap();
    assert_eq!(
        report.fixes(),
        &[
            Fix::FreeBlocksCounter {
                superblock: Some(4),
                group: Some(4),
            },
            Fix::FreeInodesCounter {
                superblock: Some(2),
                group: None,
            },
        ]
    );
    assert_eq!(report.total(), 10);
    assert_eq!(counters(&ext2), before);
}

#[test]
fn checker_skips_an_unreadable_directory() {
    let mut ext2 = small_image();
    let d = ext2.mkdir("/d").unwrap();
    let ino = ext2.copy_in("/a", "a", b"data").unwrap();
    let bid = ext2.read_inode(d).unwrap().block_ptrs().direct(0);
    // A zero record length breaks the entry chain of "/d".
    ext2.disk.block_mut(bid).unwrap()[4..6].fill(0);
    let bitmap_bid = ext2.group_descriptor().inode_bitmap_bid;
    let len = ext2.super_block().inode_bitmap_len();
    BitmapMut::new(ext2.disk.block_mut(bitmap_bid).unwrap(), len)
        .clear(ino as usize - 1)
        .unwrap();

    let report = ext2.check().unwrap();
    assert!(report.fixes().contains(&Fix::InodeNotInUse { ino }));
    assert!(ext2.is_inode_allocated(ino).unwrap());
    assert!(matches!(ext2.read_dir("/d"), Err(Ext2Error::Corrupted(_))));
}

#[test]
fn image_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.img");

    let mut ext2 = small_image();
    ext2.mkdir("/docs").unwrap();
    ext2.copy_in("/docs/readme", "readme", b"hello").unwrap();
    ext2.sync_to(&path).unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 128 * BLOCK_SIZE as u64);

    let mut reopened = Ext2::open(&path).unwrap();
    assert_eq!(reopened.path(), Some(path.as_path()));
    assert_eq!(reopened.read_file("/docs/readme").unwrap(), b"hello");
    reopened.unlink("/docs/readme").unwrap();
    reopened.sync().unwrap();

    let mut again = Ext2::open(&path).unwrap();
    assert!(matches!(again.read_file("/docs/readme"), Err(Ext2Error::NotFound(_))));
    again.restore("/docs/readme").unwrap();
    assert_eq!(again.read_file("/docs/readme").unwrap(), b"hello");

    assert!(matches!(
        Ext2::open(dir.path().join("missing.img")),
        Err(Ext2Error::ImageNotFound(_))
    ));
    let tiny = dir.path().join("tiny.img");
    std::fs::write(&tiny, [0u8; 1000]).unwrap();
    assert!(matches!(Ext2::open(&tiny), Err(Ext2Error::MapFailed(_))));
    let blank = dir.path().join("blank.img");
    std::fs::write(&blank, vec![0u8; 128 * BLOCK_SIZE]).unwrap();
    assert!(matches!(Ext2::open(&blank), Err(Ext2Error::Corrupted(_))));
}

#[test]
fn dump_lists_inodes_and_directory_blocks() {
    let mut ext2 = small_image();
    ext2.copy_in("/a", "a", b"data").unwrap();
    let summary = ext2.dump().unwrap();
    // The root and the file; lost+found is one of the reserved inodes.
    assert_eq!(summary.inodes.len(), 2);
    assert_eq!(summary.inodes[0].ino, ROOT_INO);
    assert_eq!(summary.inodes[0].type_char, 'd');
    assert_eq!(summary.inodes[1].type_char, 'f');
    assert_eq!(summary.dir_blocks.len(), 1);

    let text = summary.to_string();
    assert!(text.starts_with("Inodes: 32\nBlocks: 128\n"));
    assert!(text.contains("[12] type: f size: 4 links: 1 blocks: 1"));
    assert!(text.contains("type= d name=lost+found"));
    assert!(text.contains("type= f name=a"));
}
